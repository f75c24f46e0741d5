//! # Generic gRPC Transport
//!
//! This module contains the low-level building blocks for exchanging dynamic messages
//! over gRPC, on both sides of the wire.
//!
//! Unlike standard `tonic` services and clients which are strongly typed (e.g., `HelloRequest`),
//! the components here work with [`prost_reflect::DynamicMessage`] values whose shape is only
//! known at runtime through their descriptors.
pub mod client;
pub mod codec;
