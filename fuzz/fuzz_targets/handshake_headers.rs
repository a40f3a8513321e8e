#![no_main]

use libfuzzer_sys::fuzz_target;
use wb_core::{HandshakeHeaders, HandshakeRequest};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.splitn(3, '\n');

    let headers = HandshakeHeaders {
        epk: parts.next().unwrap_or_default().to_string(),
        ts: parts.next().unwrap_or_default().to_string(),
        sig: parts.next().map(str::to_string),
    };

    // Neither path may panic on untrusted header values.
    let _ = headers.verify(None);
    let _ = headers.verify(Some(b"fuzz secret"));

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = HandshakeRequest::from_json(&value);
    }
});
