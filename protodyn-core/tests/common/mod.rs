#![allow(dead_code)]

use greeter_service::FILE_DESCRIPTOR_SET;
use protodyn_core::{
    config::RulesConfig,
    descriptor::DescriptorSet,
    dispatch::{Dispatcher, LoggingMiddleware},
    resolver::Resolver,
    server::DynamicServer,
};
use std::sync::Arc;
use tonic::service::Routes;

pub const RULES: &str = r#"{
    "rules": {
        "Greeter.SayHello": "hello %v",
        "Greeter.SayGoodbye": "good bye %v",
        "helloworld.Doorman.Welcome": "welcome %v"
    }
}"#;

pub fn descriptors() -> DescriptorSet {
    DescriptorSet::from_bytes(FILE_DESCRIPTOR_SET).expect("Failed to load file descriptor set")
}

pub fn greeter_resolver() -> Resolver {
    RulesConfig::from_json(RULES)
        .and_then(RulesConfig::into_resolver)
        .expect("Failed to build resolver")
}

pub fn dispatcher_with(resolver: Resolver) -> Dispatcher {
    Dispatcher::from_descriptor_set(
        &descriptors(),
        resolver,
        vec![Arc::new(LoggingMiddleware)],
    )
    .expect("Failed to register services")
}

pub fn server_with(resolver: Resolver) -> DynamicServer {
    DynamicServer::new(descriptors(), dispatcher_with(resolver))
}

/// The whole server as an in-process service, no socket involved.
pub fn routes() -> Routes {
    server_with(greeter_resolver())
        .into_routes()
        .expect("Failed to build routes")
}
