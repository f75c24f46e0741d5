//! # protodyn-server
//!
//! 1. Loads the descriptor set and the response rules. Any error here aborts startup.
//! 2. Registers every unary method with the dispatcher.
//! 3. Serves them, along with server reflection, until interrupted.
mod cli;

use clap::Parser;
use cli::Cli;
use protodyn_core::{
    config::RulesConfig,
    descriptor::DescriptorSet,
    dispatch::{Dispatcher, LoggingMiddleware},
    server::{self, DynamicServer},
};
use std::{net::SocketAddr, process, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!("{e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    let descriptors = DescriptorSet::from_file(&args.descriptor_set)?;
    let resolver = RulesConfig::from_file(&args.rules)?.into_resolver()?;

    let dispatcher =
        Dispatcher::from_descriptor_set(&descriptors, resolver, vec![Arc::new(LoggingMiddleware)])?;

    let addr = SocketAddr::new(args.host, args.port);
    let listener = server::bind(addr).await?;

    DynamicServer::new(descriptors, dispatcher)
        .serve_with_shutdown(listener, shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (`info` when unset).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
