use greeter_service::FILE_DESCRIPTOR_SET;
use protodyn_core::message::{self, MessageError};
use protodyn_core::prost_reflect::{DescriptorPool, MessageDescriptor, Value};

fn message_descriptor(name: &str) -> MessageDescriptor {
    DescriptorPool::decode(FILE_DESCRIPTOR_SET)
        .unwrap()
        .get_message_by_name(name)
        .unwrap()
}

#[test]
fn new_message_is_zero_valued() {
    let msg = message::new_message(message_descriptor("helloworld.HelloRequest"));

    assert_eq!(
        message::get_field(&msg, "name").unwrap(),
        Value::String(String::new())
    );
    assert!(message::encode(&msg).is_empty());
}

#[test]
fn binary_round_trip() {
    let desc = message_descriptor("helloworld.VisitorRequest");

    let mut msg = message::new_message(desc.clone());
    message::set_field(&mut msg, "visitor", Value::String("Ann".into())).unwrap();
    message::set_field(&mut msg, "party_size", Value::U32(4)).unwrap();

    let decoded = message::decode(&message::encode(&msg), desc).unwrap();

    assert_eq!(decoded, msg);
    assert_eq!(
        message::get_field(&decoded, "party_size").unwrap(),
        Value::U32(4)
    );
}

#[test]
fn malformed_bytes_fail_to_decode() {
    // Field 1, length-delimited, announces 5 bytes but carries only one.
    let bytes = [0x0a, 0x05, b'a'];

    let result = message::decode(&bytes, message_descriptor("helloworld.HelloRequest"));

    assert!(matches!(
        result,
        Err(MessageError::Decode { message, .. }) if message == "helloworld.HelloRequest"
    ));
}

#[test]
fn undeclared_fields_are_rejected() {
    let mut msg = message::new_message(message_descriptor("helloworld.HelloRequest"));

    assert!(matches!(
        message::get_field(&msg, "surname"),
        Err(MessageError::UnknownField { field, .. }) if field == "surname"
    ));
    assert!(matches!(
        message::set_field(&mut msg, "surname", Value::String("Doe".into())),
        Err(MessageError::UnknownField { .. })
    ));
}

#[test]
fn mistyped_values_are_rejected() {
    let mut msg = message::new_message(message_descriptor("helloworld.VisitorRequest"));

    let result = message::set_field(&mut msg, "party_size", Value::String("four".into()));

    assert!(matches!(
        result,
        Err(MessageError::TypeMismatch { field, .. }) if field == "party_size"
    ));
}

#[test]
fn json_interchange() {
    let desc = message_descriptor("helloworld.VisitorRequest");

    let msg = message::from_json(
        desc.clone(),
        serde_json::json!({ "visitor": "Ann", "partySize": 2 }),
    )
    .unwrap();

    assert_eq!(
        message::get_field(&msg, "visitor").unwrap(),
        Value::String("Ann".into())
    );
    assert_eq!(
        message::to_json(&msg).unwrap(),
        serde_json::json!({ "visitor": "Ann", "partySize": 2 })
    );

    // Default-valued fields are still part of the output.
    let empty = message::new_message(message_descriptor("helloworld.HelloReply"));
    assert_eq!(
        message::to_json(&empty).unwrap(),
        serde_json::json!({ "message": "" })
    );

    let unknown = message::from_json(desc, serde_json::json!({ "name": "Ann" }));
    assert!(matches!(unknown, Err(MessageError::Decode { .. })));
}

#[test]
fn display_scalars_only() {
    assert_eq!(
        message::display_value(&Value::String("world".into())).as_deref(),
        Some("world")
    );
    assert_eq!(message::display_value(&Value::U32(7)).as_deref(), Some("7"));
    assert_eq!(
        message::display_value(&Value::Bool(true)).as_deref(),
        Some("true")
    );
    assert_eq!(message::display_value(&Value::List(vec![])), None);
}

/// A pool declaring `google.protobuf.Any` and nothing an `Any` could point to.
fn any_descriptor() -> MessageDescriptor {
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
        field_descriptor_proto::{Label, Type},
    };

    let field = |name: &str, number: i32, ty: Type, json_name: &str| FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(json_name.to_string()),
        ..Default::default()
    };

    let file = FileDescriptorProto {
        name: Some("google/protobuf/any.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Any".to_string()),
            field: vec![
                field("type_url", 1, Type::String, "typeUrl"),
                field("value", 2, Type::Bytes, "value"),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .unwrap()
        .get_message_by_name("google.protobuf.Any")
        .unwrap()
}

#[test]
fn json_rendering_failures_are_reported() {
    let mut any = message::new_message(any_descriptor());
    message::set_field(
        &mut any,
        "type_url",
        Value::String("type.googleapis.com/missing.Type".into()),
    )
    .unwrap();

    let result = message::to_json(&any);

    assert!(matches!(
        result,
        Err(MessageError::Json { message, .. }) if message == "google.protobuf.Any"
    ));
}
