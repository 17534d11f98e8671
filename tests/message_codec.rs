//! Payload-level behavior of the message builders and parsers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use fernq::core::frame::{Frame, TypeCode};
use fernq::core::serialization::{ReceiveMessage, TransitMessage, VerifyResult};
use fernq::protocol::message::*;
use fernq::ProtocolError;
use prost::Message;
use uuid::Uuid;

fn body(bytes: &[u8]) -> Vec<u8> {
    Frame::from_bytes(bytes).unwrap().payload.to_vec()
}

#[test]
fn test_verify_result_travels_as_json_inside_receive_envelope() {
    let frame = create_room_verify_res("lobby", true, "welcome").unwrap();
    let envelope = ReceiveMessage::decode(&body(&frame)[..]).unwrap();
    assert_eq!(envelope.from, "lobby");
    assert_eq!(envelope.message, br#"{"res":true,"msg":"welcome"}"#);
    assert_eq!(
        VerifyResult::from_json(&envelope.message).unwrap(),
        VerifyResult {
            res: true,
            msg: "welcome".into()
        }
    );
}

#[test]
fn test_verify_res_with_bad_json_is_error() {
    let envelope = ReceiveMessage {
        from: "lobby".into(),
        message: b"{res:yes}".to_vec(),
    };
    let err = parse_room_verify_res(&envelope.encode_to_vec()).unwrap_err();
    assert!(matches!(err, ProtocolError::Json(_)));
}

#[test]
fn test_request_message_layout() {
    let (id, frame) = create_request("alice", "bob", "/echo", b"payload");
    let transit = TransitMessage::decode(&body(&frame)[..]).unwrap();

    let expected = Uuid::parse_str(&id).unwrap();
    assert_eq!(&transit.message[..16], expected.as_bytes());

    let (got, request) = decode_request_message(&transit.message).unwrap();
    assert_eq!(got, expected);
    assert_eq!(request.url, "/echo");
    assert_eq!(request.body, b"payload");
}

#[test]
fn test_response_echoes_given_id() {
    let id = Uuid::new_v4();
    let frame = create_response("bob", "alice", &id, StatusCode(418), b"teapot");
    let frame = Frame::from_bytes(&frame).unwrap();
    assert_eq!(frame.kind().unwrap(), TypeCode::ResponseMessage);

    let transit = parse_transit_message(&frame.payload).unwrap();
    assert_eq!(transit.target, "alice");
    let (got, response) = decode_response_message(&transit.message).unwrap();
    assert_eq!(got, id);
    assert_eq!(response.status, 418);
    assert_eq!(response.body, b"teapot");
}

#[test]
fn test_correlation_prefix_boundaries() {
    assert!(matches!(
        split_correlation_id(&[1u8; 15]),
        Err(ProtocolError::CorrelationLength(15))
    ));

    let (id, rest) = split_correlation_id(&[9u8; 16]).unwrap();
    assert_eq!(id.as_bytes(), &[9u8; 16]);
    assert!(rest.is_empty());
}

#[test]
fn test_scan_request_uses_scan_type() {
    let (_, frame) = create_request_scan("alice", "^worker-", "/job", b"");
    let frame = Frame::from_bytes(&frame).unwrap();
    assert_eq!(frame.kind().unwrap(), TypeCode::RequestMessageScan);
    let transit = parse_transit_message(&frame.payload).unwrap();
    assert_eq!(transit.target, "^worker-");
}

#[test]
fn test_empty_message_is_preserved() {
    let frame = create_p2p_relay("alice", "bob", b"");
    let transit = parse_transit_message(&body(&frame)).unwrap();
    assert!(transit.message.is_empty());

    let delivered = Frame::from_bytes(&create_receive_message("alice", b"")).unwrap();
    let envelope = parse_receive_message(&delivered.payload).unwrap();
    assert_eq!(envelope.from, "alice");
    assert!(envelope.message.is_empty());
}

#[test]
fn test_forward_keeps_type_and_sender() {
    let transit = TransitMessage {
        from: "alice".into(),
        target: "lobby".into(),
        message: b"hi all".to_vec(),
    };
    let forwarded = Frame::from_bytes(&forward_transit(TypeCode::RoomBroadcast, &transit)).unwrap();
    assert_eq!(forwarded.kind().unwrap(), TypeCode::RoomBroadcast);
    let envelope = parse_receive_message(&forwarded.payload).unwrap();
    assert_eq!(envelope.from, "alice");
    assert_eq!(envelope.message, b"hi all");
}

#[test]
fn test_garbage_envelope_is_decode_error() {
    let err = parse_receive_message(&[0xFF, 0xFF, 0xFF]).unwrap_err();
    assert!(matches!(err, ProtocolError::Decode(_)));
}
