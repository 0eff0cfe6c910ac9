//! Multi-worker scanning
//!
//! The input is split into one contiguous chunk per worker. Each worker
//! builds and prepares its own engine, scans its chunk into private
//! [`ScanStats`], and hands them back on join. Nothing mutable is shared
//! during the scan except the processed-file counter. After every worker
//! has joined, the stats are merged and the correction pipeline runs once.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use memmap2::Mmap;

use crate::compiler::{PatternSet, compile_set};
use crate::config::ScanConfig;
use crate::correction::run_pipeline;
use crate::engine::{MatchEngine, build_engine};
use crate::error::{Result, ScanError};
use crate::events::{Event, EventSink, Severity, Subject};
use crate::signature::SignatureDefinition;
use crate::stats::ScanStats;

/// Processed-item counter shared with progress displays.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicUsize>);

impl Progress {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Splits `len` items into `parts` contiguous ranges whose sizes differ by
/// at most one. Returns fewer ranges when `len < parts`.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.min(len).max(1);
    if len == 0 {
        return Vec::new();
    }
    let base = len / parts;
    let extra = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

pub struct Orchestrator<'a> {
    config: ScanConfig,
    signatures: Vec<SignatureDefinition>,
    patterns: PatternSet,
    sink: &'a dyn EventSink,
    progress: Progress,
}

impl<'a> Orchestrator<'a> {
    /// Compiles `signatures` and checks the configuration.
    ///
    /// Fails with [`ScanError::NoUsableSignatures`] if nothing compiles.
    pub fn new(
        config: ScanConfig,
        signatures: Vec<SignatureDefinition>,
        sink: &'a dyn EventSink,
    ) -> Result<Self> {
        config.validate()?;
        let patterns = compile_set(&signatures, config.anchoring, sink);
        if patterns.is_empty() {
            return Err(ScanError::NoUsableSignatures);
        }
        Ok(Self {
            config,
            signatures,
            patterns,
            sink,
            progress: Progress::default(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Scans files from disk.
    pub fn scan_paths(&self, paths: &[PathBuf]) -> Result<ScanStats> {
        let max = self.config.max_file_size;
        let sink = self.sink;
        self.run(paths, |engine, _, path, stats| {
            scan_file(engine, path, max, stats, sink)
        })
    }

    /// Scans in-memory buffers, applying the same size rules as files.
    ///
    /// Oversize buffers are reported against the run by their index.
    pub fn scan_buffers(&self, buffers: &[&[u8]]) -> Result<ScanStats> {
        let max = self.config.max_file_size;
        let sink = self.sink;
        self.run(buffers, |engine, index, buffer, stats| {
            if buffer.is_empty() {
                stats.file_processed();
                return;
            }
            if buffer.len() as u64 > max {
                sink.emit(Event::new(
                    Severity::Warn,
                    Subject::Run,
                    format!(
                        "buffer #{index}: {} bytes exceeds the {max} byte ceiling, skipped",
                        buffer.len()
                    ),
                ));
                return;
            }
            stats.begin_file();
            engine.scan(buffer, stats);
            stats.file_processed();
        })
    }

    fn run<T, F>(&self, items: &[T], visit: F) -> Result<ScanStats>
    where
        T: Sync,
        F: Fn(&mut dyn MatchEngine, usize, &T, &mut ScanStats) + Sync,
    {
        self.progress.reset();
        let chunks = partition(items.len(), self.config.workers);
        let kind = self.config.engine;

        let results: Vec<Result<ScanStats>> = thread::scope(|scope| {
            let handles: Vec<_> = chunks
                .iter()
                .enumerate()
                .map(|(worker, range)| {
                    let offset = range.start;
                    let chunk = &items[range.clone()];
                    let visit = &visit;
                    scope.spawn(move || -> Result<ScanStats> {
                        let (mut engine, report) = build_engine(kind, &self.patterns)?;
                        if worker == 0 {
                            report.emit(kind, self.sink);
                        }
                        if report.active == 0 {
                            return Err(ScanError::NoUsableSignatures);
                        }

                        let mut stats = ScanStats::new();
                        for (i, item) in chunk.iter().enumerate() {
                            visit(engine.as_mut(), offset + i, item, &mut stats);
                            self.progress.tick();
                        }
                        Ok(stats)
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(ScanError::WorkerPanicked(worker)))
                })
                .collect()
        });

        let mut parts = Vec::with_capacity(results.len());
        for result in results {
            parts.push(result?);
        }

        let mut total = ScanStats::merge_all(parts);
        run_pipeline(&mut total, &self.signatures, &self.config.container);

        self.sink.emit(Event::new(
            Severity::Info,
            Subject::Run,
            format!(
                "{} engine processed {} files with {} workers",
                kind,
                total.total_files_processed,
                chunks.len()
            ),
        ));
        Ok(total)
    }
}

fn scan_file(
    engine: &mut dyn MatchEngine,
    path: &Path,
    max_file_size: u64,
    stats: &mut ScanStats,
    sink: &dyn EventSink,
) {
    let len = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => {
            sink.emit(Event::path_warning(path, "not a regular file, skipped"));
            return;
        }
        Err(e) => {
            sink.emit(Event::path_warning(path, format!("cannot stat: {e}")));
            return;
        }
    };

    if len == 0 {
        stats.file_processed();
        return;
    }
    if len > max_file_size {
        sink.emit(Event::path_warning(
            path,
            format!("{len} bytes exceeds the {max_file_size} byte ceiling, skipped"),
        ));
        return;
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            sink.emit(Event::path_warning(path, format!("cannot open: {e}")));
            return;
        }
    };
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(mmap) => mmap,
        Err(e) => {
            sink.emit(Event::path_warning(path, format!("cannot map: {e}")));
            return;
        }
    };

    #[cfg(target_os = "linux")]
    {
        let _ = mmap.advise(memmap2::Advice::Sequential);
    }

    stats.begin_file();
    engine.scan(&mmap, stats);
    stats.file_processed();
}
