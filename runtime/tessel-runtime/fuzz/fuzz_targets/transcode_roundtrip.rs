#![no_main]

use libfuzzer_sys::fuzz_target;
use tessel_runtime::transcode::{decode, encode};
use tessel_runtime::{BridgeConfig, SimGuest, StringPassing};

fuzz_target!(|input: (String, bool)| {
    let (text, exact) = input;
    let strings = if exact {
        StringPassing::Encode
    } else {
        StringPassing::EncodeInto
    };
    let mut sim = SimGuest::new(BridgeConfig {
        strings,
        ..BridgeConfig::default()
    });
    let passed = encode(&mut sim, &text).expect("encode");
    assert_eq!(passed.len as usize, text.len());
    assert!(passed.capacity >= passed.len);
    let back = decode(&mut sim, passed.ptr, passed.len).expect("decode");
    assert_eq!(back, text);
});
