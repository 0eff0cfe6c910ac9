#![no_main]

use std::sync::OnceLock;

use devscan::compiler::{PatternSet, compile_set};
use devscan::engine::build_engine;
use devscan::loader::builtin_signatures;
use devscan::{Anchoring, EngineKind, NullSink, ScanStats};
use libfuzzer_sys::fuzz_target;

fn patterns() -> &'static PatternSet {
    static PATTERNS: OnceLock<PatternSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let sigs = builtin_signatures(&NullSink).expect("built-in signatures");
        compile_set(&sigs, Anchoring::Unanchored, &NullSink)
    })
}

fuzz_target!(|data: &[u8]| {
    let mut results = Vec::new();
    for kind in [EngineKind::Backtrack, EngineKind::TwoPhase] {
        let (mut engine, _) = build_engine(kind, patterns()).expect("engine");
        let mut stats = ScanStats::new();
        stats.begin_file();
        engine.scan(data, &mut stats);
        assert!(stats.counts.values().all(|&n| n == 1));
        results.push(stats);
    }
    assert_eq!(results[0], results[1]);
});
