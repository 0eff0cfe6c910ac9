//! Rendering final statistics
//!
//! Zero counts are dropped here, not in the scanning core.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::engine::EngineKind;
use crate::error::Result;
use crate::stats::ScanStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub scan_target: String,
    pub engine: EngineKind,
    pub total_files_processed: u64,
    pub detections: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub embedded: BTreeMap<String, u64>,
}

fn non_zero(counts: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(name, n)| (name.clone(), *n))
        .collect()
}

impl ScanReport {
    pub fn new(scan_target: impl Into<String>, engine: EngineKind, stats: &ScanStats) -> Self {
        Self {
            scan_target: scan_target.into(),
            engine,
            total_files_processed: stats.total_files_processed,
            detections: non_zero(&stats.counts),
            embedded: non_zero(&stats.embedded_counts),
        }
    }

    /// One line per type: `found X NAME` or `found X NAME (Y embedded)`,
    /// where X includes the embedded detections.
    pub fn summary_lines(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.detections.keys().chain(self.embedded.keys()).collect();
        names
            .into_iter()
            .map(|name| {
                let standalone = self.detections.get(name).copied().unwrap_or(0);
                let embedded = self.embedded.get(name).copied().unwrap_or(0);
                let total = standalone + embedded;
                if embedded > 0 {
                    format!("found {total} {name} ({embedded} embedded)")
                } else {
                    format!("found {total} {name}")
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        let rule = "-".repeat(32);
        let mut out = String::new();
        out.push_str("--- SCAN RESULTS ---\n");
        out.push_str(&format!("Target: {}\n", self.scan_target));
        out.push_str(&format!("Engine: {}\n", self.engine));
        out.push_str(&format!("{rule}\n"));
        out.push_str(&format!("{:<15} | Found\n", "File type"));
        out.push_str(&format!("{rule}\n"));
        for (name, n) in &self.detections {
            out.push_str(&format!("{name:<15} | {n}\n"));
        }
        if !self.embedded.is_empty() {
            out.push_str(&format!("{rule}\n"));
            out.push_str(&format!("{:<15} | Embedded\n", "File type"));
            for (name, n) in &self.embedded {
                out.push_str(&format!("{name:<15} | {n}\n"));
            }
        }
        out.push_str(&format!("{rule}\n"));
        out.push_str(&format!("Total files processed: {}\n", self.total_files_processed));
        out
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }
}
