pub mod compiler;
pub mod config;
pub mod correction;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod logging;
pub mod orchestrator;
pub mod report;
pub mod signature;
pub mod stats;

pub use compiler::{Anchoring, CompiledPattern, PatternSet};
pub use config::{ContainerPolicy, ScanConfig};
pub use engine::{EngineKind, MatchEngine, PrepareReport};
pub use error::{Result, ScanError};
pub use events::{CollectingSink, Event, EventSink, NullSink, Severity, Subject, TracingSink};
pub use orchestrator::{Orchestrator, Progress};
pub use report::ScanReport;
pub use signature::{SignatureDefinition, SignatureKind};
pub use stats::ScanStats;
