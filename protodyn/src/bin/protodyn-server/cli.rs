//! # CLI
//!
//! Command-line interface of `protodyn-server`, parsed with `clap`.
use clap::Parser;
use std::{net::IpAddr, path::PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "protodyn-server",
    version,
    about = "Serve every unary method of a descriptor set, answering from response templates"
)]
pub struct Cli {
    /// Path to the descriptor set (.pb / .bin), as produced by `protoc --descriptor_set_out`
    #[arg(long, short = 'd')]
    pub descriptor_set: PathBuf,

    /// Path to the JSON response rules
    #[arg(long, short = 'r')]
    pub rules: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 50051)]
    pub port: u16,
}
