#![no_main]

use fernq::protocol::address::{extract_info, resolve};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = resolve(text, "fuzz");
    }
    let _ = extract_info(data);
});
