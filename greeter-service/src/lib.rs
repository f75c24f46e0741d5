//! # Greeter Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide the `helloworld` descriptor set
//! and a statically typed client for integration testing `protodyn`.
//! It is not intended for production use.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/helloworld.rs"));
}

pub use pb::greeter_client::GreeterClient;
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
