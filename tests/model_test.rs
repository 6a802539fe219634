use redq::{Decoded, Message};

#[test]
fn new_message_gets_a_uuid() {
    let message = Message::new("foo");
    let uuid = uuid::Uuid::parse_str(message.uuid()).expect("uuid should parse");
    assert_eq!(uuid.get_version_num(), 7);
    assert_eq!(message.data(), "foo");
}

#[test]
fn explicit_uuid_is_kept() {
    let message = Message::with_uuid("foo", "bar");
    assert_eq!(message.uuid(), "bar");
}

#[test]
fn encode_uses_uuid_then_data() {
    let message = Message::with_uuid("foo", "1234");
    assert_eq!(
        message.encode().unwrap(),
        r#"{"uuid":"1234","data":"foo"}"#
    );
}

#[test]
fn decode_returns_the_encoded_message() {
    let message = Message::new("payload with \"quotes\" and\nnewlines");
    let decoded = Message::decode(&message.encode().unwrap());
    assert_eq!(decoded, Decoded::Tracked(message));
}

#[test]
fn plain_string_decodes_as_raw() {
    assert_eq!(
        Message::decode("just text"),
        Decoded::Raw("just text".to_string())
    );
}

#[test]
fn json_without_message_shape_decodes_as_raw() {
    for raw in [r#"{"data":"x"}"#, r#"{"uuid":"x"}"#, "[1,2]", "42", "null"] {
        assert!(Message::decode(raw).is_raw(), "{raw} should be raw");
    }
}

#[test]
fn raw_payload_becomes_message_data() {
    let message = Message::decode(r#"{"data":"x"}"#).into_message();
    assert_eq!(message.data(), r#"{"data":"x"}"#);
    assert!(!message.uuid().is_empty());
}
