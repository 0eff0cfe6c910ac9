//! Per-file and aggregate detection statistics

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// Detection counts for one worker, or for a whole run after merging.
///
/// `detected_types` only gates the at-most-once increment for the buffer
/// currently being scanned; it never takes part in merging or equality.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub counts: BTreeMap<String, u64>,
    pub embedded_counts: BTreeMap<String, u64>,
    #[serde(skip)]
    pub detected_types: HashSet<String>,
    pub total_files_processed: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new buffer. Accumulated counts are kept.
    pub fn begin_file(&mut self) {
        self.detected_types.clear();
    }

    /// Clears everything, including accumulated counts.
    pub fn reset_all(&mut self) {
        self.counts.clear();
        self.embedded_counts.clear();
        self.detected_types.clear();
        self.total_files_processed = 0;
    }

    /// Records a detection for the current buffer.
    ///
    /// Returns `false` if `name` was already counted since the last
    /// [`begin_file`](Self::begin_file).
    pub fn record(&mut self, name: &str) -> bool {
        if self.detected_types.contains(name) {
            return false;
        }
        self.detected_types.insert(name.to_string());
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
        true
    }

    pub fn file_processed(&mut self) {
        self.total_files_processed += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn embedded(&self, name: &str) -> u64 {
        self.embedded_counts.get(name).copied().unwrap_or(0)
    }

    /// A signature is present when it has a non-zero primary count.
    pub fn is_present(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Pointwise sum of both count maps plus processed totals.
    pub fn merge(&mut self, other: &ScanStats) {
        for (name, n) in &other.counts {
            *self.counts.entry(name.clone()).or_insert(0) += n;
        }
        for (name, n) in &other.embedded_counts {
            *self.embedded_counts.entry(name.clone()).or_insert(0) += n;
        }
        self.total_files_processed += other.total_files_processed;
    }

    pub fn merge_all<I>(parts: I) -> ScanStats
    where
        I: IntoIterator<Item = ScanStats>,
    {
        parts.into_iter().fold(ScanStats::new(), |mut acc, part| {
            acc.merge(&part);
            acc
        })
    }

    /// Moves a primary count into `embedded_counts`.
    pub fn relocate_to_embedded(&mut self, name: &str) {
        if let Some(n) = self.counts.remove(name) {
            *self.embedded_counts.entry(name.to_string()).or_insert(0) += n;
        }
    }
}

impl PartialEq for ScanStats {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
            && self.embedded_counts == other.embedded_counts
            && self.total_files_processed == other.total_files_processed
    }
}

impl Eq for ScanStats {}
