//! Two-phase filter + verify backend
//!
//! Phase 1 runs all patterns at once through a `RegexSet` and returns the
//! indices that matched somewhere. Phase 2 re-checks only those indices
//! with the individually compiled `Regex`. Both run in linear time.

use regex::bytes::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

use super::{EngineKind, Exclusion, MatchEngine, PrepareReport};
use crate::compiler::{CompiledPattern, PatternSet};
use crate::error::Result;
use crate::stats::ScanStats;

const SIZE_LIMIT: usize = 64 * 1024 * 1024;

struct Verifier {
    pattern: CompiledPattern,
    regex: Regex,
}

/// `RegexSet` prefilter over individually verified patterns.
#[derive(Default)]
pub struct TwoPhaseEngine {
    verifiers: Vec<Verifier>,
    /// `None` when the combined set exceeded its size limit; every
    /// verifier then runs on each buffer.
    filter: Option<RegexSet>,
}

impl TwoPhaseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when phase 1 is active
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    fn verify(&self, index: usize, buffer: &[u8], stats: &mut ScanStats) {
        let Some(v) = self.verifiers.get(index) else {
            return;
        };
        if v.pattern.applies_to(buffer.len()) && v.regex.is_match(buffer) {
            stats.record(&v.pattern.name);
        }
    }
}

fn set_member(pattern: &CompiledPattern) -> String {
    if pattern.caseless {
        format!("(?i:{})", pattern.expression)
    } else {
        pattern.expression.clone()
    }
}

impl MatchEngine for TwoPhaseEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::TwoPhase
    }

    fn prepare(&mut self, patterns: &PatternSet) -> Result<PrepareReport> {
        let mut report = PrepareReport::default();
        self.verifiers.clear();
        self.filter = None;

        for pattern in patterns.patterns() {
            let built = RegexBuilder::new(&pattern.expression)
                .unicode(false)
                .dot_matches_new_line(true)
                .case_insensitive(pattern.caseless)
                .size_limit(SIZE_LIMIT)
                .build();
            match built {
                Ok(regex) => self.verifiers.push(Verifier {
                    pattern: pattern.clone(),
                    regex,
                }),
                Err(e) => report.excluded.push(Exclusion {
                    name: pattern.name.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        if !self.verifiers.is_empty() {
            let members: Vec<String> = self
                .verifiers
                .iter()
                .map(|v| set_member(&v.pattern))
                .collect();
            match RegexSetBuilder::new(&members)
                .unicode(false)
                .dot_matches_new_line(true)
                .size_limit(SIZE_LIMIT)
                .build()
            {
                Ok(set) => self.filter = Some(set),
                Err(e) => {
                    tracing::debug!(error = %e, "combined set unavailable, verifying every pattern");
                }
            }
        }

        report.active = self.verifiers.len();
        Ok(report)
    }

    fn scan(&mut self, buffer: &[u8], stats: &mut ScanStats) {
        if buffer.is_empty() {
            return;
        }
        match &self.filter {
            Some(set) => {
                for index in set.matches(buffer).iter() {
                    self.verify(index, buffer, stats);
                }
            }
            None => {
                for index in 0..self.verifiers.len() {
                    self.verify(index, buffer, stats);
                }
            }
        }
    }

    fn active_patterns(&self) -> usize {
        self.verifiers.len()
    }
}
