//! # Dynamic Message Factory
//!
//! Structural (un)marshaling of messages known only through their [`MessageDescriptor`].
//!
//! A [`DynamicMessage`] is a tagged union of [`Value`]s keyed by declared field, backed by the
//! shared, immutable descriptor. Every helper here enforces that a message never holds a field
//! its descriptor does not declare: reads and writes address fields by name and fail with
//! [`MessageError::UnknownField`] otherwise.
//!
//! Two interchange forms are supported:
//!
//! * **Binary**: the Protobuf wire format, used on the network ([`decode`] / [`encode`]).
//! * **JSON**: the canonical Protobuf JSON mapping, used at the edges ([`from_json`] / [`to_json`]).
//!
//! Nothing in this module knows about business semantics.
use bytes::Bytes;
use prost::Message;
use prost_reflect::{
    DynamicMessage, MessageDescriptor, ReflectMessage, SerializeOptions, SetFieldError, Value,
};

#[derive(thiserror::Error, Debug)]
pub enum MessageError {
    #[error("Failed to decode '{message}': '{reason}'")]
    Decode { message: String, reason: String },
    #[error("'{message}' has no JSON representation: '{reason}'")]
    Json { message: String, reason: String },
    #[error("Field '{field}' is not declared by '{message}'")]
    UnknownField { message: String, field: String },
    #[error("Field '{field}' of '{message}' cannot hold value {value:?}")]
    TypeMismatch {
        message: String,
        field: String,
        value: Value,
    },
}

/// Creates a zero-valued message.
pub fn new_message(descriptor: MessageDescriptor) -> DynamicMessage {
    DynamicMessage::new(descriptor)
}

/// Decodes Protobuf binary bytes into a message of the given type.
pub fn decode(bytes: &[u8], descriptor: MessageDescriptor) -> Result<DynamicMessage, MessageError> {
    let message = descriptor.full_name().to_string();
    DynamicMessage::decode(descriptor, bytes).map_err(|e| MessageError::Decode {
        message,
        reason: e.to_string(),
    })
}

/// Encodes a message into Protobuf binary bytes.
pub fn encode(message: &DynamicMessage) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

/// Reads a declared field. Unset fields yield their default value.
pub fn get_field(message: &DynamicMessage, name: &str) -> Result<Value, MessageError> {
    message
        .get_field_by_name(name)
        .map(|value| value.into_owned())
        .ok_or_else(|| MessageError::UnknownField {
            message: message.descriptor().full_name().to_string(),
            field: name.to_string(),
        })
}

/// Writes a declared field.
pub fn set_field(message: &mut DynamicMessage, name: &str, value: Value) -> Result<(), MessageError> {
    let message_name = message.descriptor().full_name().to_string();

    message
        .try_set_field_by_name(name, value)
        .map_err(|err| match err {
            SetFieldError::NotFound => MessageError::UnknownField {
                message: message_name,
                field: name.to_string(),
            },
            SetFieldError::InvalidType { field, value } => MessageError::TypeMismatch {
                message: message_name,
                field: field.name().to_string(),
                value,
            },
        })
}

/// Builds a message from its JSON representation.
///
/// Keys that the descriptor does not declare are rejected instead of being dropped.
pub fn from_json(
    descriptor: MessageDescriptor,
    value: serde_json::Value,
) -> Result<DynamicMessage, MessageError> {
    let message = descriptor.full_name().to_string();
    // serde_json::Value implements IntoDeserializer, so we can pass it directly.
    DynamicMessage::deserialize(descriptor, value).map_err(|e| MessageError::Decode {
        message,
        reason: e.to_string(),
    })
}

/// Converts a message into its JSON representation, default-valued fields included.
///
/// Fails for messages the JSON mapping cannot express, e.g. an `Any` whose type is
/// not in the descriptor pool.
pub fn to_json(message: &DynamicMessage) -> Result<serde_json::Value, MessageError> {
    let options = SerializeOptions::new().skip_default_fields(false);

    message
        .serialize_with_options(serde_json::value::Serializer, &options)
        .map_err(|e| MessageError::Json {
            message: message.descriptor().full_name().to_string(),
            reason: e.to_string(),
        })
}

/// Renders a scalar value as plain text, the way it should appear inside a formatted string.
///
/// Composite values (messages, lists and maps) have no single-line rendering and yield `None`.
pub fn display_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::EnumNumber(v) => v.to_string(),
        Value::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
        Value::Message(_) | Value::List(_) | Value::Map(_) => return None,
    };

    Some(text)
}
