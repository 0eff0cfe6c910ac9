//! Backtracking backend
//!
//! Every signature gets its own Thompson NFA, run by a bounded backtracker
//! while the haystack fits its visited set and by a PikeVM beyond that.
//! The simplest backend and the slowest one: cost grows with the number
//! of signatures times the buffer length.

use regex_automata::Input;
use regex_automata::nfa::thompson::backtrack::{self, BoundedBacktracker};
use regex_automata::nfa::thompson::pikevm::{self, PikeVM};
use regex_automata::nfa::thompson::{self, NFA};
use regex_automata::util::syntax;

use super::{EngineKind, Exclusion, MatchEngine, PrepareReport};
use crate::compiler::{CompiledPattern, PatternSet};
use crate::error::Result;
use crate::stats::ScanStats;

/// Visited-set budget per pattern, in bytes
const VISITED_CAPACITY: usize = 4 * 1024 * 1024;

struct Matcher {
    name: String,
    min_file_size: u64,
    backtracker: BoundedBacktracker,
    backtrack_cache: backtrack::Cache,
    pikevm: PikeVM,
    pikevm_cache: pikevm::Cache,
}

impl Matcher {
    fn build(pattern: &CompiledPattern) -> std::result::Result<Self, String> {
        let nfa = NFA::compiler()
            .syntax(
                syntax::Config::new()
                    .unicode(false)
                    .utf8(false)
                    .dot_matches_new_line(true)
                    .case_insensitive(pattern.caseless),
            )
            .configure(thompson::Config::new().utf8(false))
            .build(&pattern.expression)
            .map_err(|e| e.to_string())?;

        let backtracker = BoundedBacktracker::builder()
            .configure(BoundedBacktracker::config().visited_capacity(VISITED_CAPACITY))
            .build_from_nfa(nfa.clone())
            .map_err(|e| e.to_string())?;
        let pikevm = PikeVM::new_from_nfa(nfa).map_err(|e| e.to_string())?;

        Ok(Self {
            name: pattern.name.clone(),
            min_file_size: pattern.min_file_size,
            backtrack_cache: backtracker.create_cache(),
            backtracker,
            pikevm_cache: pikevm.create_cache(),
            pikevm,
        })
    }

    fn is_match(&mut self, buffer: &[u8]) -> bool {
        let input = Input::new(buffer).earliest(true);
        if buffer.len() <= self.backtracker.max_haystack_len() {
            if let Ok(found) = self.backtracker.try_is_match(&mut self.backtrack_cache, input.clone()) {
                return found;
            }
        }
        self.pikevm.is_match(&mut self.pikevm_cache, input)
    }
}

/// One independent automaton per signature, tried in priority order.
#[derive(Default)]
pub struct BacktrackEngine {
    matchers: Vec<Matcher>,
}

impl BacktrackEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchEngine for BacktrackEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Backtrack
    }

    fn prepare(&mut self, patterns: &PatternSet) -> Result<PrepareReport> {
        let mut report = PrepareReport::default();
        self.matchers.clear();

        for pattern in patterns.patterns() {
            match Matcher::build(pattern) {
                Ok(m) => self.matchers.push(m),
                Err(reason) => report.excluded.push(Exclusion {
                    name: pattern.name.clone(),
                    reason,
                }),
            }
        }

        report.active = self.matchers.len();
        Ok(report)
    }

    fn scan(&mut self, buffer: &[u8], stats: &mut ScanStats) {
        if buffer.is_empty() {
            return;
        }
        for matcher in &mut self.matchers {
            if (buffer.len() as u64) < matcher.min_file_size
                || stats.detected_types.contains(&matcher.name)
            {
                continue;
            }
            if matcher.is_match(buffer) {
                stats.record(&matcher.name);
            }
        }
    }

    fn active_patterns(&self) -> usize {
        self.matchers.len()
    }
}
