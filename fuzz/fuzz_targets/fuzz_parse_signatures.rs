#![no_main]

use devscan::NullSink;
use devscan::loader::parse_signatures;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(sigs) = parse_signatures(text, &NullSink) {
            assert!(sigs.iter().all(|s| !s.name.is_empty() && !s.is_empty()));
        }
    }
});
