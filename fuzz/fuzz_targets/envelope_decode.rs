#![no_main]

use libfuzzer_sys::fuzz_target;
use wb_core::{is_wire_box, QueuePayload, WireEnvelope};

fuzz_target!(|data: &[u8]| {
    // Binary form: must never panic, and decoded envelopes re-encode exactly.
    if let Ok(envelope) = WireEnvelope::from_bytes(data, "fuzz", 0) {
        assert_eq!(envelope.to_bytes(), data, "binary form not lossless");
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // JSON form: decode, re-encode, decode again to the same envelope.
    if let Ok(envelope) = WireEnvelope::from_json(text) {
        let json = envelope.to_json().expect("encode decoded envelope");
        let again = WireEnvelope::from_json(&json).expect("re-decode encoded envelope");
        assert_eq!(envelope, again, "JSON form not lossless");
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        let _ = is_wire_box(&value);
        let _ = WireEnvelope::from_json_value(&value);
    }

    if let Ok(payload) = QueuePayload::from_json(text) {
        let _ = payload.to_envelope("fuzz");
    }
});
