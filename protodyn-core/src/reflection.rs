//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! It enables a client to query a server for its own Protobuf schema at runtime, so that
//! requests can be built and responses decoded without a pre-shared schema.
//!
//! The protocol bindings are the ones shipped by `tonic-reflection`, which the server side
//! also uses to publish its descriptors.
pub mod client;
