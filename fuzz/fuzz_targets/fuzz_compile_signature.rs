#![no_main]

use devscan::compiler::{Anchoring, compile_signature};
use devscan::{NullSink, SignatureDefinition, SignatureKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut fields = text.splitn(3, '\n');
    let sig = SignatureDefinition {
        name: "FUZZ".to_string(),
        kind: if data.first().is_some_and(|b| b & 1 == 1) {
            SignatureKind::Text
        } else {
            SignatureKind::Binary
        },
        hex_head: fields.next().unwrap_or_default().to_string(),
        hex_tail: fields.next().unwrap_or_default().to_string(),
        text_pattern: fields.next().unwrap_or_default().to_string(),
        ..SignatureDefinition::default()
    };
    let _ = compile_signature(&sig, Anchoring::Unanchored, &NullSink);
});
