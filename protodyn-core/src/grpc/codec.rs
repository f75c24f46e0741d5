//! # Dynamic Message Codec
//!
//! This module implements `tonic::codec::Codec` to enable `tonic` to transport
//! [`DynamicMessage`]s directly, bypassing the need for generated Rust structs.
//!
//! The same codec serves both ends of a call, only the descriptors are swapped:
//!
//! | side   | encodes with      | decodes with      |
//! |--------|-------------------|-------------------|
//! | client | method input      | method output     |
//! | server | method output     | method input      |
//!
//! 1. **Encoder**: Checks that the outgoing message has the expected type and writes its
//!    Protobuf bytes into the gRPC buffer.
//! 2. **Decoder**: Reads raw bytes from the wire and decodes them with the expected
//!    `MessageDescriptor`.
use crate::message;
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor, ReflectMessage};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A custom Codec that bridges [`DynamicMessage`] and Protobuf binary format.
pub struct DynamicCodec {
    encode_desc: MessageDescriptor,
    decode_desc: MessageDescriptor,
}

impl DynamicCodec {
    /// Codec used by a client calling `method`.
    pub fn client(method: &MethodDescriptor) -> Self {
        Self {
            encode_desc: method.input(),
            decode_desc: method.output(),
        }
    }

    /// Codec used by a server answering `method`.
    pub fn server(method: &MethodDescriptor) -> Self {
        Self {
            encode_desc: method.output(),
            decode_desc: method.input(),
        }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder(self.encode_desc.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.decode_desc.clone())
    }
}

/// Responsible for encoding a dynamic message into Protobuf bytes.
pub struct DynamicEncoder(MessageDescriptor);

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        if item.descriptor() != self.0 {
            return Err(Status::internal(format!(
                "Expected a '{}' message, got '{}'",
                self.0.full_name(),
                item.descriptor().full_name()
            )));
        }

        item.encode_raw(dst);
        Ok(())
    }
}

/// Responsible for decoding Protobuf bytes into a dynamic message.
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = message::new_message(self.0.clone());
        msg.merge(src).map_err(|e| {
            Status::invalid_argument(format!(
                "Failed to decode '{}' from Protobuf bytes: {}",
                self.0.full_name(),
                e
            ))
        })?;

        Ok(Some(msg))
    }
}
