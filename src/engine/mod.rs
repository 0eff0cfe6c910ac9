//! Matching backends
//!
//! Three interchangeable engines sit behind [`MatchEngine`]:
//!
//! | Kind | Algorithm | Scan-time state |
//! |------|-----------|-----------------|
//! | [`EngineKind::Backtrack`] | one bounded backtracker per pattern, PikeVM for long inputs | per-pattern caches |
//! | [`EngineKind::TwoPhase`] | combined `RegexSet` filter, then per-pattern verify | regex-internal pools |
//! | [`EngineKind::Vectorscan`] | one Vectorscan block database | per-engine scratch |
//!
//! An engine is prepared once and then scans many buffers. `scan` takes
//! `&mut self`, so one instance can never run two scans at once; the
//! orchestrator builds one instance per worker thread.

mod backtrack;
mod two_phase;
#[cfg(feature = "vectorscan")]
mod vectorscan;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compiler::PatternSet;
use crate::error::{Result, ScanError};
use crate::events::{Event, EventSink};
use crate::stats::ScanStats;

pub use backtrack::BacktrackEngine;
pub use two_phase::TwoPhaseEngine;
#[cfg(feature = "vectorscan")]
pub use vectorscan::VectorscanEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    Backtrack,
    #[default]
    TwoPhase,
    Vectorscan,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [
        EngineKind::Backtrack,
        EngineKind::TwoPhase,
        EngineKind::Vectorscan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Backtrack => "backtrack",
            EngineKind::TwoPhase => "two-phase",
            EngineKind::Vectorscan => "vectorscan",
        }
    }

    /// True if this build can construct the engine
    pub fn is_available(self) -> bool {
        match self {
            EngineKind::Backtrack | EngineKind::TwoPhase => true,
            EngineKind::Vectorscan => cfg!(feature = "vectorscan"),
        }
    }

    /// Engines usable in this build
    pub fn available() -> impl Iterator<Item = EngineKind> {
        Self::ALL.into_iter().filter(|k| k.is_available())
    }

    /// Creates a fresh, unprepared engine
    pub fn create(self) -> Result<Box<dyn MatchEngine>> {
        match self {
            EngineKind::Backtrack => Ok(Box::new(BacktrackEngine::new())),
            EngineKind::TwoPhase => Ok(Box::new(TwoPhaseEngine::new())),
            #[cfg(feature = "vectorscan")]
            EngineKind::Vectorscan => Ok(Box::new(VectorscanEngine::new())),
            #[cfg(not(feature = "vectorscan"))]
            EngineKind::Vectorscan => Err(ScanError::EngineUnavailable(self)),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "backtrack" | "boost" => Ok(EngineKind::Backtrack),
            "two-phase" | "twophase" | "re2" => Ok(EngineKind::TwoPhase),
            "vectorscan" | "hyperscan" | "hs" => Ok(EngineKind::Vectorscan),
            other => Err(ScanError::InvalidConfig(format!("unknown engine {other:?}"))),
        }
    }
}

/// A signature the backend could not express
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub name: String,
    pub reason: String,
}

/// Outcome of [`MatchEngine::prepare`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub active: usize,
    pub excluded: Vec<Exclusion>,
}

impl PrepareReport {
    /// Emits one warning per excluded signature
    pub fn emit(&self, engine: EngineKind, sink: &dyn EventSink) {
        for exclusion in &self.excluded {
            sink.emit(Event::signature_warning(
                &exclusion.name,
                format!("excluded from {engine}: {}", exclusion.reason),
            ));
        }
    }
}

/// Contract shared by every backend.
pub trait MatchEngine: Send {
    fn kind(&self) -> EngineKind;

    /// Compiles the full pattern set. Calling it again replaces the set.
    ///
    /// Patterns a backend cannot express are excluded and listed in the
    /// report. Only a failure that leaves the engine unusable is an `Err`.
    fn prepare(&mut self, patterns: &PatternSet) -> Result<PrepareReport>;

    /// Records at most one detection per active signature into `stats`.
    ///
    /// The caller is responsible for [`ScanStats::begin_file`].
    fn scan(&mut self, buffer: &[u8], stats: &mut ScanStats);

    fn active_patterns(&self) -> usize;
}

/// Creates an engine of `kind` and prepares it
pub fn build_engine(
    kind: EngineKind,
    patterns: &PatternSet,
) -> Result<(Box<dyn MatchEngine>, PrepareReport)> {
    let mut engine = kind.create()?;
    let report = engine.prepare(patterns)?;
    Ok((engine, report))
}
