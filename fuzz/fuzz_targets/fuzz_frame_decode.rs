#![no_main]

use bytes::BytesMut;
use fernq::core::codec::FrameCodec;
use fernq::core::frame::decode;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Slice decoder: drain until need-more or error
    let mut rest = data;
    while let Ok(Some((_, _, remainder))) = decode(rest) {
        rest = remainder;
    }

    // Codec decoder must agree on never panicking
    let mut buf = BytesMut::from(data);
    let mut codec = FrameCodec::new();
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
