use protodyn_core::dispatch::{
    CallHandler, CallInfo, DispatchError, Dispatcher, DispatcherBuilder, Middleware, Next,
};
use protodyn_core::message;
use protodyn_core::prost_reflect::{DynamicMessage, ReflectMessage, Value};
use std::sync::{Arc, Mutex};
use tonic::{Code, Status};

mod common;

fn greeter_service() -> protodyn_core::prost_reflect::ServiceDescriptor {
    common::descriptors()
        .pool()
        .get_service_by_name("helloworld.Greeter")
        .unwrap()
}

fn hello_request(dispatcher: &Dispatcher, path: &str, name: &str) -> DynamicMessage {
    let info = dispatcher.method_by_path(path).unwrap();
    let mut request = message::new_message(info.method().input());
    message::set_field(&mut request, "name", Value::String(name.into())).unwrap();
    request
}

fn reply_text(response: &DynamicMessage) -> String {
    match message::get_field(response, "message").unwrap() {
        Value::String(s) => s,
        other => panic!("Unexpected value {other:?}"),
    }
}

#[test]
fn registers_unary_methods_in_order() {
    let dispatcher = common::dispatcher_with(common::greeter_resolver());

    let names: Vec<_> = dispatcher.methods().map(|m| m.full_name()).collect();
    assert_eq!(
        names,
        [
            "helloworld.Greeter.SayHello",
            "helloworld.Greeter.SayGoodbye",
            "helloworld.Doorman.Welcome"
        ]
    );

    let info = dispatcher
        .method_by_path("/helloworld.Greeter/SayHello")
        .unwrap();
    assert_eq!(info.short_name(), "Greeter.SayHello");
    assert_eq!(info.path(), "/helloworld.Greeter/SayHello");
}

#[test]
fn streaming_methods_are_not_reachable() {
    let dispatcher = common::dispatcher_with(common::greeter_resolver());

    assert!(
        dispatcher
            .method_by_path("/helloworld.Greeter/SayHelloStream")
            .is_none()
    );

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayHello", "world");
    let status = dispatcher
        .call("/helloworld.Greeter/SayHelloStream", request)
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
}

#[test]
fn duplicate_registration_fails_atomically() {
    let service = greeter_service();
    let mut builder = DispatcherBuilder::new(common::greeter_resolver());

    assert_eq!(builder.add_service(&service).unwrap(), 2);

    let result = builder.add_service(&service);
    assert!(matches!(
        result,
        Err(DispatchError::DuplicateMethod(name)) if name == "helloworld.Greeter.SayHello"
    ));

    let dispatcher = builder.build();
    assert_eq!(dispatcher.methods().len(), 2);
}

#[test]
fn duplicate_registration_aborts_startup() {
    fn startup() -> Result<Dispatcher, DispatchError> {
        let service = greeter_service();
        let mut builder = Dispatcher::builder(common::greeter_resolver());
        builder.add_service(&service)?;
        builder.add_service(&service)?;
        Ok(builder.build())
    }

    assert!(matches!(startup(), Err(DispatchError::DuplicateMethod(_))));
}

#[test]
fn calls_reach_the_resolver() {
    let dispatcher = common::dispatcher_with(common::greeter_resolver());

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayHello", "world");
    let response = dispatcher
        .call("/helloworld.Greeter/SayHello", request)
        .unwrap();
    assert_eq!(response.descriptor().full_name(), "helloworld.HelloReply");
    assert_eq!(reply_text(&response), "hello world");

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayGoodbye", "Ann");
    let response = dispatcher
        .call("/helloworld.Greeter/SayGoodbye", request)
        .unwrap();
    assert_eq!(reply_text(&response), "good bye Ann");
}

#[test]
fn unset_subject_renders_its_default() {
    let dispatcher = common::dispatcher_with(common::greeter_resolver());

    let info = dispatcher
        .method_by_path("/helloworld.Greeter/SayHello")
        .unwrap();
    let request = message::new_message(info.method().input());

    let response = dispatcher
        .call("/helloworld.Greeter/SayHello", request)
        .unwrap();
    assert_eq!(response.descriptor().full_name(), "helloworld.HelloReply");
    assert_eq!(reply_text(&response), "hello ");
}

#[test]
fn rejects_requests_of_the_wrong_type() {
    let dispatcher = common::dispatcher_with(common::greeter_resolver());

    let info = dispatcher
        .method_by_path("/helloworld.Doorman/Welcome")
        .unwrap();
    let visitor = message::new_message(info.method().input());

    let status = dispatcher
        .call("/helloworld.Greeter/SayHello", visitor)
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[test]
fn rejects_responses_of_the_wrong_type() {
    // Echoes the request back, which is never a `HelloReply`.
    let echo = |_: &CallInfo, request: DynamicMessage| -> Result<DynamicMessage, Status> {
        Ok(request)
    };

    let mut builder = Dispatcher::builder(echo);
    builder.add_service(&greeter_service()).unwrap();
    let dispatcher = builder.build();

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayHello", "world");
    let status = dispatcher
        .call("/helloworld.Greeter/SayHello", request)
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Recorder {
    fn call(
        &self,
        info: &CallInfo,
        request: DynamicMessage,
        next: Next<'_>,
    ) -> Result<DynamicMessage, Status> {
        self.log.lock().unwrap().push(format!("{} before", self.label));
        let result = next.run(info, request);
        self.log.lock().unwrap().push(format!("{} after", self.label));
        result
    }
}

struct Deny;

impl Middleware for Deny {
    fn call(&self, _: &CallInfo, _: DynamicMessage, _: Next<'_>) -> Result<DynamicMessage, Status> {
        Err(Status::permission_denied("denied"))
    }
}

struct CountingHandler {
    inner: protodyn_core::resolver::Resolver,
    calls: Arc<Mutex<usize>>,
}

impl CallHandler for CountingHandler {
    fn call(&self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        *self.calls.lock().unwrap() += 1;
        self.inner.call(info, request)
    }
}

#[test]
fn middlewares_wrap_the_call_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Mutex::new(0));

    let handler = CountingHandler {
        inner: common::greeter_resolver(),
        calls: calls.clone(),
    };

    let mut builder = Dispatcher::builder(handler)
        .with_middleware(Recorder {
            label: "outer",
            log: log.clone(),
        })
        .with_middleware(Recorder {
            label: "inner",
            log: log.clone(),
        });
    builder.add_service(&greeter_service()).unwrap();
    let dispatcher = builder.build();

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayHello", "world");
    dispatcher
        .call("/helloworld.Greeter/SayHello", request)
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        ["outer before", "inner before", "inner after", "outer after"]
    );
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn middlewares_can_short_circuit() {
    let calls = Arc::new(Mutex::new(0));

    let handler = CountingHandler {
        inner: common::greeter_resolver(),
        calls: calls.clone(),
    };

    let mut builder = Dispatcher::builder(handler).with_middleware(Deny);
    builder.add_service(&greeter_service()).unwrap();
    let dispatcher = builder.build();

    let request = hello_request(&dispatcher, "/helloworld.Greeter/SayHello", "world");
    let status = dispatcher
        .call("/helloworld.Greeter/SayHello", request)
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(*calls.lock().unwrap(), 0);
}
