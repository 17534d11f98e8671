#![no_main]

use fernq::protocol::message::{
    parse_receive_message, parse_request, parse_response, parse_room_verify_res,
    parse_transit_message,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_receive_message(data);
    let _ = parse_transit_message(data);
    let _ = parse_room_verify_res(data);
    let _ = parse_request(data);
    let _ = parse_response(data);
});
