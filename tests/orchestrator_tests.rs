use std::fs;
use std::path::PathBuf;

use devscan::discovery::discover_files;
use devscan::loader::builtin_signatures;
use devscan::{
    Anchoring, CollectingSink, EngineKind, NullSink, Orchestrator, ScanConfig, ScanError,
    ScanStats, Severity, SignatureDefinition,
};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn corpus() -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let mut docx = b"PK\x03\x04".to_vec();
    docx.extend_from_slice(b"word/document.xml");
    docx.resize(128, 0);
    docx.extend_from_slice(b"<?xml version=\"1.0\"?>");

    let mut zip = b"PK\x03\x04hello.txt".to_vec();
    zip.resize(96, 0);

    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.resize(200, b' ');

    let mut rar5 = b"Rar!\x1a\x07\x01\x00".to_vec();
    rar5.resize(40, 0);

    let files = vec![
        write(&dir, "a.docx", &docx),
        write(&dir, "b.zip", &zip),
        write(&dir, "c.pdf", &pdf),
        write(&dir, "d.pdf", &pdf),
        write(&dir, "e.rar", &rar5),
        write(&dir, "f.empty", b""),
        write(&dir, "g.html", b"<html><body>page</body></html>"),
        write(&dir, "h.json", b"{\"name\": \"value\"}"),
        write(&dir, "i.bin", &[0x80; 64]),
    ];
    (dir, files)
}

fn run(engine: EngineKind, workers: usize, files: &[PathBuf]) -> ScanStats {
    let sigs = builtin_signatures(&NullSink).unwrap();
    let config = ScanConfig::new().with_engine(engine).with_workers(workers);
    let orchestrator = Orchestrator::new(config, sigs, &NullSink).unwrap();
    orchestrator.scan_paths(files).unwrap()
}

#[test]
fn test_scan_corpus_with_corrections() {
    let (_dir, files) = corpus();
    let stats = run(EngineKind::TwoPhase, 3, &files);

    assert_eq!(stats.total_files_processed, 9);
    assert_eq!(stats.count("PDF"), 2);
    assert_eq!(stats.count("DOCX"), 1);
    assert_eq!(stats.count("ZIP"), 1);
    assert_eq!(stats.count("RAR5"), 1);
    assert_eq!(stats.count("XML"), 0);
    assert_eq!(stats.embedded("XML"), 1);
    assert_eq!(stats.embedded("HTML"), 1);
    assert_eq!(stats.embedded("JSON"), 1);
}

#[test]
fn test_worker_count_does_not_change_results() {
    let (_dir, files) = corpus();
    for engine in EngineKind::available() {
        let single = run(engine, 1, &files);
        for workers in [2, 3, 4, 9, 16] {
            assert_eq!(run(engine, workers, &files), single, "{engine} with {workers} workers");
        }
    }
}

#[test]
fn test_missing_file_is_skipped_and_reported() {
    let (dir, mut files) = corpus();
    let missing = dir.path().join("gone.pdf");
    files.insert(2, missing.clone());

    let sink = CollectingSink::new();
    let sigs = builtin_signatures(&NullSink).unwrap();
    let orchestrator = Orchestrator::new(ScanConfig::new().with_workers(2), sigs, &sink).unwrap();
    let stats = orchestrator.scan_paths(&files).unwrap();

    assert_eq!(stats.total_files_processed, 9);
    assert_eq!(stats.count("PDF"), 2);
    let events = sink.for_path(&missing);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warn);
    assert_eq!(orchestrator.progress().get(), 10);
}

#[test]
fn test_oversize_file_is_skipped_with_warning() {
    let dir = TempDir::new().unwrap();
    let mut big = b"%PDF-1.7".to_vec();
    big.resize(4096, b' ');
    let big = write(&dir, "big.pdf", &big);
    let mut small = b"%PDF-1.7".to_vec();
    small.resize(64, b' ');
    let small = write(&dir, "small.pdf", &small);

    let sink = CollectingSink::new();
    let sigs = vec![SignatureDefinition::binary("PDF", "25504446")];
    let config = ScanConfig::new().with_workers(1).with_max_file_size(1024);
    let orchestrator = Orchestrator::new(config, sigs, &sink).unwrap();
    let stats = orchestrator.scan_paths(&[big.clone(), small]).unwrap();

    assert_eq!(stats.count("PDF"), 1);
    assert_eq!(stats.total_files_processed, 1);
    assert_eq!(sink.for_path(&big).len(), 1);
}

#[test]
fn test_zero_length_files_count_as_processed() {
    let dir = TempDir::new().unwrap();
    let files: Vec<_> = (0..5).map(|i| write(&dir, &format!("{i}.bin"), b"")).collect();
    let stats = run(EngineKind::Backtrack, 2, &files);
    assert_eq!(stats.total_files_processed, 5);
    assert!(stats.counts.is_empty());
}

#[test]
fn test_empty_path_list() {
    let stats = run(EngineKind::TwoPhase, 4, &[]);
    assert_eq!(stats, ScanStats::new());
}

#[test]
fn test_discovered_tree_scans_like_explicit_list() {
    let (dir, files) = corpus();
    let discovered = discover_files(dir.path(), &NullSink);
    assert_eq!(discovered.len(), files.len());
    assert_eq!(run(EngineKind::TwoPhase, 2, &discovered), run(EngineKind::TwoPhase, 2, &files));
}

#[test]
fn test_no_usable_signatures_halts() {
    let sink = CollectingSink::new();
    let sigs = vec![SignatureDefinition::binary("BROKEN", "XYZ")];
    let result = Orchestrator::new(ScanConfig::new(), sigs, &sink);
    assert!(matches!(result, Err(ScanError::NoUsableSignatures)));
    assert!(!sink.for_signature("BROKEN").is_empty());
}

#[test]
fn test_backend_exclusions_reported_once() {
    let sink = CollectingSink::new();
    let sigs = vec![
        SignatureDefinition::text("BACKREF", r"(ab)\1"),
        SignatureDefinition::binary("PDF", "25504446"),
    ];
    let config = ScanConfig::new().with_engine(EngineKind::TwoPhase).with_workers(4);
    let orchestrator = Orchestrator::new(config, sigs, &sink).unwrap();
    let (_dir, files) = corpus();
    let stats = orchestrator.scan_paths(&files).unwrap();

    assert_eq!(stats.count("PDF"), 2);
    assert_eq!(sink.for_signature("BACKREF").len(), 1);
}

#[test]
fn test_backend_rejecting_everything_is_fatal() {
    let sigs = vec![SignatureDefinition::text("BACKREF", r"(ab)\1")];
    let orchestrator = Orchestrator::new(ScanConfig::new().with_workers(2), sigs, &NullSink).unwrap();
    let (_dir, files) = corpus();
    assert!(matches!(
        orchestrator.scan_paths(&files),
        Err(ScanError::NoUsableSignatures)
    ));
}

#[test]
fn test_default_config_ignores_inner_headers() {
    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.extend_from_slice(b"stream PK\x03\x04 embedded archive bytes ");
    pdf.extend_from_slice(b"ID3 tag quoted in a comment\nendstream\n");
    let note = b"Release note: the ID3 parser now handles v2.4 frames.\n";
    let buffers: [&[u8]; 2] = [&pdf, note];

    let sigs = builtin_signatures(&NullSink).unwrap();
    for engine in EngineKind::available() {
        let config = ScanConfig::new().with_engine(engine).with_workers(2);
        let orchestrator = Orchestrator::new(config, sigs.clone(), &NullSink).unwrap();
        let stats = orchestrator.scan_buffers(&buffers).unwrap();

        assert_eq!(stats.count("PDF"), 1, "{engine}");
        assert_eq!(stats.counts.len(), 1, "{engine}: {:?}", stats.counts);
        assert_eq!(stats.total_files_processed, 2);
    }
}

#[test]
fn test_unanchored_config_finds_inner_headers() {
    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.extend_from_slice(b"stream PK\x03\x04 embedded archive bytes endstream\n");
    let buffers: [&[u8]; 1] = [&pdf];

    let sigs = builtin_signatures(&NullSink).unwrap();
    let config = ScanConfig::new()
        .with_workers(1)
        .with_anchoring(Anchoring::Unanchored);
    let orchestrator = Orchestrator::new(config, sigs, &NullSink).unwrap();
    let stats = orchestrator.scan_buffers(&buffers).unwrap();

    assert_eq!(stats.count("PDF"), 1);
    assert_eq!(stats.count("ZIP"), 1);
}
