//! # CLI
//!
//! Command-line interface of `protodyn-client`, parsed with `clap`.
//!
//! Besides parsing, it validates headers (`key:value`) and keeps `--file` and `--symbol`
//! mutually exclusive.
use clap::{ArgGroup, Parser};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "protodyn-client",
    version,
    about = "Discover a server through reflection and call each of its unary methods"
)]
#[command(group(ArgGroup::new("discovery").args(["file", "symbol"])))]
pub struct Cli {
    /// The server URL to connect to
    #[arg(long, default_value = "http://localhost:50051")]
    pub addr: String,

    /// Value sent in the request field
    #[arg(long, default_value = "world")]
    pub name: String,

    /// Request field receiving the value
    #[arg(long, default_value = "name")]
    pub field: String,

    /// Proto file to fetch from the server (e.g. helloworld.proto)
    #[arg(long)]
    pub file: Option<String>,

    /// Fully-qualified symbol to fetch from the server (e.g. helloworld.Greeter)
    #[arg(long)]
    pub symbol: Option<String>,

    /// Deadline of the connection and of each call, in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    pub timeout_ms: u64,

    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}
