//! # Transport Endpoint
//!
//! Binds a [`Dispatcher`] to a TCP listener.
//!
//! Besides the dynamic methods, the endpoint publishes the loaded descriptor set through
//! the gRPC Server Reflection Protocol (both `grpc.reflection.v1` and the older
//! `grpc.reflection.v1alpha`), so that clients can build requests and decode responses
//! without a pre-shared schema.
//!
//! Every call is handled on its own task by the tonic runtime, to completion or failure.
use crate::{descriptor::DescriptorSet, dispatch::Dispatcher};
use prost_types::FileDescriptorSet;
use std::{future::Future, net::SocketAddr};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{service::Routes, transport::Server};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind '{addr}': '{source}'")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build the reflection service: '{0}'")]
    Reflection(#[from] tonic_reflection::server::Error),
    #[error("Server failed: '{0}'")]
    Serve(#[from] tonic::transport::Error),
}

/// A gRPC server answering every method of a descriptor set dynamically.
#[derive(Debug, Clone)]
pub struct DynamicServer {
    descriptors: DescriptorSet,
    dispatcher: Dispatcher,
}

impl DynamicServer {
    pub fn new(descriptors: DescriptorSet, dispatcher: Dispatcher) -> Self {
        Self {
            descriptors,
            dispatcher,
        }
    }

    /// Builds the routing table: one route per registered method, plus the reflection services.
    ///
    /// The result is itself a `tower::Service`, which makes it usable in-process without any socket.
    pub fn into_routes(self) -> Result<Routes, TransportError> {
        let files = self.descriptors.file_descriptor_set();

        let v1 = reflection_builder(files).build_v1()?;
        let v1alpha = reflection_builder(files).build_v1alpha()?;

        let mut router = Routes::new(v1).add_service(v1alpha).into_axum_router();

        for info in self.dispatcher.methods() {
            router = router.route_service(info.path(), self.dispatcher.clone());
        }

        Ok(Routes::from(router))
    }

    /// Binds `addr` and serves until the process is stopped.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), TransportError> {
        let listener = bind(addr).await?;

        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves on an already bound listener until `signal` completes.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), TransportError> {
        let methods = self.dispatcher.methods().len();
        let routes = self.into_routes()?;

        match listener.local_addr() {
            Ok(addr) => tracing::info!(%addr, methods, "server listening"),
            Err(err) => tracing::warn!(%err, methods, "server listening on unknown address"),
        }

        Server::builder()
            .add_routes(routes)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await?;

        tracing::info!("server stopped");
        Ok(())
    }
}

/// Binds a TCP listener for [`DynamicServer::serve_with_shutdown`].
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })
}

fn reflection_builder(files: &FileDescriptorSet) -> tonic_reflection::server::Builder<'static> {
    tonic_reflection::server::Builder::configure().register_file_descriptor_set(files.clone())
}
