// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::frame::{decode, Frame, TypeCode};
use crate::error::ProtocolError;
use crate::protocol::address::{extract_info, resolve};
use crate::protocol::message::*;

fn single_frame(bytes: &[u8]) -> Frame {
    Frame::from_bytes(bytes).expect("exactly one frame")
}

#[test]
fn test_join_exchange_flow() {
    // =================== Step 1: Client builds the join frame ===================
    let url = "fernq://alice@10.0.0.5:7001/room-42#team?room_pass=hunter2";
    let resolved = resolve(url, "alice").expect("valid url");
    assert_eq!(resolved.address, "10.0.0.5:7001");

    // =================== Step 2: Relay reads the join request ===================
    let join = single_frame(&resolved.verify_frame);
    assert_eq!(join.kind().unwrap(), TypeCode::RoomVerify);
    let envelope = parse_room_verify(&join.payload).expect("join envelope");
    assert_eq!(envelope.client_id, "alice");
    assert_eq!(envelope.token, url);

    let info = extract_info(&join.payload).expect("room info");
    assert_eq!(info.room_id, "room-42");
    assert_eq!(info.password, "hunter2");

    // =================== Step 3: Relay answers, client parses ===================
    let verdict = create_room_verify_res(&info.room_name, false, "wrong password").unwrap();
    let verdict = single_frame(&verdict);
    assert_eq!(verdict.kind().unwrap(), TypeCode::RoomVerifyRes);
    let (accepted, msg) = parse_room_verify_res(&verdict.payload).unwrap();
    assert!(!accepted);
    assert_eq!(msg, "wrong password");
}

#[test]
fn test_transit_frames_carry_target_and_sender() {
    let cases = [
        (create_p2p_relay("alice", "bob", b"x"), TypeCode::P2PRelay, "bob"),
        (create_room_broadcast("alice", "lobby", b"x"), TypeCode::RoomBroadcast, "lobby"),
        (create_user_scan("alice", "^b.*", b"x"), TypeCode::UserScan, "^b.*"),
        (
            create_user_scan_single("alice", "^b.*", b"x"),
            TypeCode::UserScanSingle,
            "^b.*",
        ),
    ];

    for (bytes, code, target) in cases {
        let frame = single_frame(&bytes);
        assert_eq!(frame.kind().unwrap(), code);
        let transit = parse_transit_message(&frame.payload).unwrap();
        assert_eq!(transit.from, "alice");
        assert_eq!(transit.target, target);
        assert_eq!(transit.message, b"x");
    }
}

#[test]
fn test_request_response_correlation_through_relay() {
    // Requester -> relay
    let (id, request) = create_request("alice", "bob", "/status", b"{}");
    assert_eq!(id.len(), 36);
    let request = single_frame(&request);
    let transit = parse_transit_message(&request.payload).unwrap();
    assert_eq!(transit.target, "bob");

    // Relay -> responder
    let forwarded = single_frame(&forward_transit(TypeCode::RequestMessage, &transit));
    let (from, request_id, body) = parse_request(&forwarded.payload).unwrap();
    assert_eq!(from, "alice");
    assert_eq!(request_id.hyphenated().to_string(), id);
    assert_eq!(body.url, "/status");
    assert_eq!(body.body, b"{}");

    // Responder -> relay -> requester
    let response = create_response("bob", &from, &request_id, StatusCode::NOT_FOUND, b"gone");
    let transit = parse_transit_message(&single_frame(&response).payload).unwrap();
    let delivered = single_frame(&forward_transit(TypeCode::ResponseMessage, &transit));
    let (from, response_id, body) = parse_response(&delivered.payload).unwrap();
    assert_eq!(from, "bob");
    assert_eq!(response_id, request_id);
    assert_eq!(StatusCode::from(body.status), StatusCode::NOT_FOUND);
    assert_eq!(body.body, b"gone");
}

#[test]
fn test_request_ids_are_fresh() {
    let (first, _) = create_request("a", "b", "/", b"");
    let (second, _) = create_request_scan("a", ".*", "/", b"");
    assert_ne!(first, second);
}

#[test]
fn test_short_correlated_message_is_length_error() {
    let err = decode_request_message(&[0u8; 15]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorrelationLength(15)));

    let err = decode_response_message(&[]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorrelationLength(0)));
}

#[test]
fn test_delivered_message_helpers() {
    let id = uuid::Uuid::new_v4();
    let response = create_response("bob", "alice", &id, StatusCode::OK, b"ok");
    let transit = parse_transit_message(&single_frame(&response).payload).unwrap();

    let message = FernqMessage {
        type_code: TypeCode::ResponseMessage.as_u16(),
        from: transit.from,
        message: transit.message.into(),
    };
    assert!(message.is_response());
    assert!(!message.is_request());
    let (got, body) = message.response().unwrap();
    assert_eq!(got, id);
    assert_eq!(body.status, 200);

    assert!(matches!(
        message.request(),
        Err(ProtocolError::UnexpectedMessage(0xA7))
    ));
}

#[test]
fn test_heartbeats_are_bare_headers() {
    assert_eq!(create_ping(), vec![0, 0, 0, 6, 0x00, 0xA3]);
    assert_eq!(create_pong(), vec![0, 0, 0, 6, 0x00, 0xA4]);

    let mut stream = create_ping();
    stream.extend(create_receive_message("relay", b"hello"));
    let (code, body, rest) = decode(&stream).unwrap().unwrap();
    assert_eq!(code, 0xA3);
    assert!(body.is_empty());
    let (code, body, rest) = decode(rest).unwrap().unwrap();
    assert_eq!(code, 0xA5);
    assert!(rest.is_empty());
    let envelope = parse_receive_message(body).unwrap();
    assert_eq!(envelope.from, "relay");
    assert_eq!(envelope.message, b"hello");
}

#[test]
fn test_status_code_display() {
    assert_eq!(StatusCode::OK.to_string(), "200 OK");
    assert_eq!(StatusCode(299).to_string(), "299");
    assert!(StatusCode(204).is_success());
    assert!(!StatusCode::BAD_GATEWAY.is_success());
}
