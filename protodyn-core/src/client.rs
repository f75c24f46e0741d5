//! # Dynamic Client
//!
//! This module implements the client side of the dynamic exchange: given only the address of a
//! server, it discovers the server's schema through reflection and invokes its methods with
//! messages built at runtime.
//!
//! ## Example
//!
//! ```rust,no_run
//! use protodyn_core::client::{Discovery, DynamicClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = DynamicClient::connect("http://localhost:50051").await?;
//!
//! let descriptors = client
//!     .discover(&Discovery::Filename("helloworld.proto".into()))
//!     .await?;
//!
//! for outcome in client
//!     .call_unary_methods(&descriptors, "name", "world", vec![])
//!     .await?
//! {
//!     println!("{}: {:?}", outcome.method, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```
use crate::{
    BoxError,
    descriptor::{DescriptorError, DescriptorSet},
    grpc::client::{GrpcClient, GrpcRequestError},
    message::{self, MessageError},
    reflection::client::{ReflectionClient, ReflectionError},
};
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::{collections::BTreeMap, time::Duration};
use tonic::transport::{Channel, Endpoint};

/// Prefix shared by the reflection services, which are never called generically.
const REFLECTION_PACKAGE: &str = "grpc.reflection.";

/// Deadline used by [`DynamicClient::connect`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Errors that can occur while calling a discovered method.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid request body: '{0}'")]
    InvalidBody(#[from] MessageError),
    #[error("Response cannot be rendered as JSON: '{0}'")]
    InvalidResponse(#[source] MessageError),
    #[error("gRPC client request error: '{0}'")]
    Request(#[from] GrpcRequestError),
}

/// How the client locates the schema on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// A file known to the server, e.g. `helloworld.proto`.
    Filename(String),
    /// A fully-qualified symbol, e.g. `helloworld.Greeter`.
    Symbol(String),
    /// Every service the server lists, reflection excluded.
    AllServices,
}

/// The outcome of calling one discovered method.
#[derive(Debug)]
pub struct MethodOutcome {
    /// Fully-qualified method name, e.g. `helloworld.Greeter.SayHello`.
    pub method: String,
    pub result: CallResult,
}

#[derive(Debug)]
pub enum CallResult {
    /// The server answered, the JSON representation of the response.
    Response(serde_json::Value),
    /// The server answered with an error status.
    Failed(tonic::Status),
    /// The request could not be built for this method's input type.
    Skipped(MessageError),
    /// The server answered with a message that has no JSON rendering.
    Unreadable(MessageError),
}

/// A client calling any unary method of a server whose schema is fetched at runtime.
#[derive(Debug, Clone)]
pub struct DynamicClient<S = Channel> {
    reflection_client: ReflectionClient<S>,
    grpc_client: GrpcClient<S>,
}

impl DynamicClient<Channel> {
    /// Connects to a gRPC server with [`DEFAULT_TIMEOUT`].
    ///
    /// # Arguments
    ///
    /// * `addr` - The server URI (e.g., `http://localhost:50051`).
    pub async fn connect(addr: &str) -> Result<Self, ClientConnectError> {
        Self::connect_with_timeout(addr, DEFAULT_TIMEOUT).await
    }

    /// Connects to a gRPC server. `timeout` bounds the connection attempt and every call
    /// made afterwards, reflection lookups included.
    pub async fn connect_with_timeout(
        addr: &str,
        timeout: Duration,
    ) -> Result<Self, ClientConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.to_string(), e))?
            .connect_timeout(timeout)
            .timeout(timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.to_string(), e))?;

        Ok(Self::from_service(channel))
    }
}

impl<S> DynamicClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        Self {
            reflection_client: ReflectionClient::new(service.clone()),
            grpc_client: GrpcClient::new(service),
        }
    }

    /// Lists services available on the server via Reflection.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        self.reflection_client.list_services().await
    }

    /// Fetches descriptors from the server.
    ///
    /// Any failure, whether the peer is unreachable or answers with malformed data,
    /// is reported as [`DescriptorError::FetchFailed`] or, for protos that decode but do
    /// not link, [`DescriptorError::Unresolved`].
    pub async fn discover(&mut self, discovery: &Discovery) -> Result<DescriptorSet, DescriptorError> {
        let set = match discovery {
            Discovery::Filename(name) => self.reflection_client.descriptors_by_filename(name).await?,
            Discovery::Symbol(symbol) => self.reflection_client.descriptors_by_symbol(symbol).await?,
            Discovery::AllServices => self.discover_all_services().await?,
        };

        tracing::info!(
            files = set.file_descriptor_set().file.len(),
            ?discovery,
            "fetched descriptors"
        );

        Ok(set)
    }

    async fn discover_all_services(&mut self) -> Result<DescriptorSet, DescriptorError> {
        let mut files: BTreeMap<String, FileDescriptorProto> = BTreeMap::new();

        for service in self.reflection_client.list_services().await? {
            if service.starts_with(REFLECTION_PACKAGE) {
                continue;
            }

            let set = self.reflection_client.descriptors_by_symbol(&service).await?;

            for file in &set.file_descriptor_set().file {
                files
                    .entry(file.name().to_string())
                    .or_insert_with(|| file.clone());
            }
        }

        DescriptorSet::from_file_descriptor_set(FileDescriptorSet {
            file: files.into_values().collect(),
        })
    }

    /// Calls a unary method with a JSON body, answering with the JSON response.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(ClientError)` - The body does not match the input type, the request could not be sent,
    ///   or the response has no JSON rendering.
    pub async fn call(
        &mut self,
        method: MethodDescriptor,
        body: serde_json::Value,
        headers: Vec<(String, String)>,
    ) -> Result<Result<serde_json::Value, tonic::Status>, ClientError> {
        let request = message::from_json(method.input(), body)?;

        match self.grpc_client.unary(method, request, headers).await? {
            Ok(response) => message::to_json(&response)
                .map(Ok)
                .map_err(ClientError::InvalidResponse),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Calls every unary method of every discovered service with `{ field: argument }`.
    ///
    /// Methods whose input type cannot hold the argument are reported as skipped;
    /// streaming methods and reflection services are left out.
    pub async fn call_unary_methods(
        &mut self,
        descriptors: &DescriptorSet,
        field: &str,
        argument: &str,
        headers: Vec<(String, String)>,
    ) -> Result<Vec<MethodOutcome>, GrpcRequestError> {
        let mut outcomes = Vec::new();

        let methods: Vec<MethodDescriptor> = descriptors
            .services()
            .filter(|service| !service.full_name().starts_with(REFLECTION_PACKAGE))
            .flat_map(|service| service.methods().collect::<Vec<_>>())
            .filter(|method| !method.is_client_streaming() && !method.is_server_streaming())
            .collect();

        for method in methods {
            let name = method.full_name().to_string();
            let body = single_field_body(field, argument);

            let result = match message::from_json(method.input(), body) {
                Ok(request) => match self
                    .grpc_client
                    .unary(method, request, headers.clone())
                    .await?
                {
                    Ok(response) => match message::to_json(&response) {
                        Ok(json) => CallResult::Response(json),
                        Err(err) => CallResult::Unreadable(err),
                    },
                    Err(status) => CallResult::Failed(status),
                },
                Err(err) => {
                    tracing::warn!(method = %name, %err, "skipping method");
                    CallResult::Skipped(err)
                }
            };

            outcomes.push(MethodOutcome {
                method: name,
                result,
            });
        }

        Ok(outcomes)
    }
}

fn single_field_body(field: &str, argument: &str) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(
        field.to_string(),
        serde_json::Value::String(argument.to_string()),
    );
    serde_json::Value::Object(body)
}
