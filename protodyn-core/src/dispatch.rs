//! # Generic Method Dispatcher
//!
//! Turns service descriptors into a table of unary method handlers, without any
//! generated server code.
//!
//! For every registered method, a call follows the same steps:
//!
//! 1. The request bytes are decoded with the method's input descriptor ([`DynamicCodec`]).
//! 2. The resulting [`DynamicMessage`] goes through the [`Middleware`] chain, in registration order.
//! 3. The innermost step hands it to the [`CallHandler`], the business logic.
//! 4. The returned message is checked against the output descriptor and encoded.
//!
//! Streaming methods are skipped at registration time and are never reachable.
//!
//! A [`Dispatcher`] is a cheap-to-clone `tower::Service` routing by HTTP/2 path
//! (`/package.Service/Method`); unknown paths are answered with `Unimplemented`.
mod middleware;

pub use middleware::{LoggingMiddleware, Middleware, Next};

use crate::{
    descriptor::DescriptorSet,
    grpc::{client::method_path, codec::DynamicCodec},
};
use prost_reflect::{DynamicMessage, MethodDescriptor, ReflectMessage, ServiceDescriptor};
use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};
use tonic::{
    Status,
    codegen::{Body, BoxFuture, StdError},
};

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Method '{0}' is registered more than once")]
    DuplicateMethod(String),
}

/// Static information about the method being called.
#[derive(Debug, Clone)]
pub struct CallInfo {
    method: MethodDescriptor,
    full_name: String,
    short_name: String,
    path: String,
}

impl CallInfo {
    pub fn new(method: MethodDescriptor) -> Self {
        let full_name = method.full_name().to_string();
        let short_name = format!("{}.{}", method.parent_service().name(), method.name());
        let path = method_path(&method);

        Self {
            method,
            full_name,
            short_name,
            path,
        }
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// e.g. `helloworld.Greeter.SayHello`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The name without package, e.g. `Greeter.SayHello`
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// e.g. `/helloworld.Greeter/SayHello`
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The business logic answering every dispatched call.
pub trait CallHandler: Send + Sync + 'static {
    fn call(&self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status>;
}

impl<F> CallHandler for F
where
    F: Fn(&CallInfo, DynamicMessage) -> Result<DynamicMessage, Status> + Send + Sync + 'static,
{
    fn call(&self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        self(info, request)
    }
}

/// Collects unary methods before freezing them into a [`Dispatcher`].
pub struct DispatcherBuilder {
    handler: Arc<dyn CallHandler>,
    middlewares: Vec<Arc<dyn Middleware>>,
    methods: Vec<Arc<CallInfo>>,
    names: HashSet<String>,
}

impl DispatcherBuilder {
    pub fn new(handler: impl CallHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            middlewares: Vec::new(),
            methods: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Appends a middleware. The first one added is the outermost.
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Registers every unary method of `service`, in declaration order.
    ///
    /// Registration is all-or-nothing: if any method name is already taken, none of
    /// the service's methods are added.
    ///
    /// # Returns
    ///
    /// The number of registered methods.
    pub fn add_service(&mut self, service: &ServiceDescriptor) -> Result<usize, DispatchError> {
        let mut staged: Vec<Arc<CallInfo>> = Vec::new();

        for method in service.methods() {
            if method.is_client_streaming() || method.is_server_streaming() {
                tracing::info!(method = %method.full_name(), "skipping streaming method");
                continue;
            }

            let info = CallInfo::new(method);
            if self.names.contains(info.full_name())
                || staged.iter().any(|s| s.full_name() == info.full_name())
            {
                return Err(DispatchError::DuplicateMethod(info.full_name().to_string()));
            }

            staged.push(Arc::new(info));
        }

        let count = staged.len();
        for info in staged {
            tracing::info!(method = %info.full_name(), path = %info.path(), "registered method");
            self.names.insert(info.full_name().to_string());
            self.methods.push(info);
        }

        Ok(count)
    }

    pub fn build(self) -> Dispatcher {
        let by_path = self
            .methods
            .iter()
            .map(|info| (info.path().to_string(), info.clone()))
            .collect();

        Dispatcher {
            inner: Arc::new(Inner {
                by_path,
                methods: self.methods,
                handler: self.handler,
                middlewares: self.middlewares,
            }),
        }
    }
}

struct Inner {
    by_path: HashMap<String, Arc<CallInfo>>,
    methods: Vec<Arc<CallInfo>>,
    handler: Arc<dyn CallHandler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

/// An immutable method table plus the chain that answers calls.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.inner.methods)
            .field("middlewares", &self.inner.middlewares.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn builder(handler: impl CallHandler) -> DispatcherBuilder {
        DispatcherBuilder::new(handler)
    }

    /// Registers every service of `set`, in enumeration order.
    pub fn from_descriptor_set(
        set: &DescriptorSet,
        handler: impl CallHandler,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<Self, DispatchError> {
        let mut builder = DispatcherBuilder::new(handler);
        builder.middlewares = middlewares;

        for service in set.services() {
            builder.add_service(&service)?;
        }

        Ok(builder.build())
    }

    /// Registered methods, in registration order.
    pub fn methods(&self) -> impl ExactSizeIterator<Item = &CallInfo> + '_ {
        self.inner.methods.iter().map(|info| info.as_ref())
    }

    pub fn method_by_path(&self, path: &str) -> Option<&CallInfo> {
        self.inner.by_path.get(path).map(|info| info.as_ref())
    }

    /// Runs an already decoded request through the chain.
    pub fn call(&self, path: &str, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        let info = self
            .method_by_path(path)
            .ok_or_else(|| Status::unimplemented(format!("Method '{path}' is not served")))?;

        self.invoke(info, request)
    }

    fn invoke(&self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        let input = info.method().input();
        if request.descriptor() != input {
            return Err(Status::invalid_argument(format!(
                "Expected a '{}' request, got '{}'",
                input.full_name(),
                request.descriptor().full_name()
            )));
        }

        let next = Next::new(&self.inner.middlewares, self.inner.handler.as_ref());
        let response = next.run(info, request)?;

        let output = info.method().output();
        if response.descriptor() != output {
            return Err(Status::internal(format!(
                "Handler for '{}' answered with '{}' instead of '{}'",
                info.full_name(),
                response.descriptor().full_name(),
                output.full_name()
            )));
        }

        Ok(response)
    }
}

impl<B> tower::Service<http::Request<B>> for Dispatcher
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let path = req.uri().path().to_string();

        let Some(info) = self.inner.by_path.get(&path).cloned() else {
            tracing::debug!(%path, "no method registered for path");
            return Box::pin(async move {
                Ok(Status::unimplemented(format!("Method '{path}' is not served")).into_http())
            });
        };

        let dispatcher = self.clone();
        Box::pin(async move {
            let codec = DynamicCodec::server(info.method());
            let mut grpc = tonic::server::Grpc::new(codec);
            let response = grpc.unary(UnaryCall { dispatcher, info }, req).await;
            Ok(response)
        })
    }
}

/// Adapts one registered method to tonic's unary server machinery.
struct UnaryCall {
    dispatcher: Dispatcher,
    info: Arc<CallInfo>,
}

impl tonic::server::UnaryService<DynamicMessage> for UnaryCall {
    type Response = DynamicMessage;
    type Future = BoxFuture<tonic::Response<Self::Response>, Status>;

    fn call(&mut self, request: tonic::Request<DynamicMessage>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let info = self.info.clone();

        Box::pin(async move {
            dispatcher
                .invoke(&info, request.into_inner())
                .map(tonic::Response::new)
        })
    }
}
