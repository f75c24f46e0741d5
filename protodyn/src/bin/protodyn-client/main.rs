//! # protodyn-client
//!
//! Connects to a server, fetches its schema through reflection, then calls every unary
//! method once with a request built from a single string argument.
mod cli;

use clap::Parser;
use cli::Cli;
use protodyn_core::client::{CallResult, Discovery, DynamicClient};
use std::process;
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
    let timeout = args.timeout();

    let discovery = match (args.file, args.symbol) {
        (Some(file), _) => Discovery::Filename(file),
        (None, Some(symbol)) => Discovery::Symbol(symbol),
        (None, None) => Discovery::AllServices,
    };

    let mut client = DynamicClient::connect_with_timeout(&args.addr, timeout).await?;
    let descriptors = client.discover(&discovery).await?;

    let outcomes = client
        .call_unary_methods(&descriptors, &args.field, &args.name, args.headers)
        .await?;

    for outcome in outcomes {
        match outcome.result {
            CallResult::Response(value) => println!("{}: {value}", outcome.method),
            CallResult::Failed(status) => eprintln!(
                "{}: gRPC Failed: code={:?} message={:?}",
                outcome.method,
                status.code(),
                status.message()
            ),
            CallResult::Skipped(err) => eprintln!("{}: skipped: {err}", outcome.method),
            CallResult::Unreadable(err) => eprintln!("{}: unreadable response: {err}", outcome.method),
        }
    }

    Ok(())
}

/// Logs to stderr, filtered by `RUST_LOG` (`warn` when unset) so stdout only carries responses.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
