//! # Protodyn Core
//!
//! `protodyn-core` serves and calls gRPC methods whose Protobuf schema is only known at runtime,
//! from a serialized `FileDescriptorSet`, without any generated message types.
//!
//! ## Server side
//!
//! * **[`descriptor::DescriptorSet`]:** Loads the service and message descriptors.
//! * **[`dispatch::Dispatcher`]:** Builds one generic handler per unary method and runs each call
//!   through an explicit [`dispatch::Middleware`] chain before reaching a [`dispatch::CallHandler`].
//! * **[`resolver::Resolver`]:** The handler used by the `protodyn-server` binary. It answers
//!   every method with a one-slot template filled from a request field.
//! * **[`server::DynamicServer`]:** Serves the dispatcher over TCP and publishes the descriptors
//!   through server reflection.
//!
//! ## Client side
//!
//! * **[`client::DynamicClient`]:** Discovers a server's schema via reflection and calls its
//!   methods with JSON bodies.
//! * **[`grpc::client::GrpcClient`]** and **[`reflection::client::ReflectionClient`]:** The lower
//!   level clients it is built on.
//!
//! ## Dynamic messages
//!
//! [`message`] holds the structural (un)marshaling helpers shared by both sides, and
//! [`grpc::codec::DynamicCodec`] plugs them into `tonic`.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod grpc;
pub mod message;
pub mod reflection;
pub mod resolver;
pub mod server;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
