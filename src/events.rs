//! Warning and error events raised while loading, compiling and scanning.
//!
//! Nothing in the library logs through a global. Every component that can
//! degrade gracefully takes an [`EventSink`] and reports what it skipped, so
//! the binary can forward events to `tracing` while tests capture them.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// What an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Signature(String),
    Path(PathBuf),
    Run,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Signature(name) => write!(f, "signature {name}"),
            Subject::Path(path) => write!(f, "{}", path.display()),
            Subject::Run => f.write_str("run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub severity: Severity,
    pub subject: Subject,
    pub message: String,
}

impl Event {
    pub fn new(severity: Severity, subject: Subject, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject,
            message: message.into(),
        }
    }

    pub fn signature_warning(name: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, Subject::Signature(name.to_string()), message)
    }

    pub fn path_warning(path: &Path, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, Subject::Path(path.to_path_buf()), message)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Receiver for events. Shared by all workers, so it must be `Sync`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events to the `tracing` subscriber installed by the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        let Event {
            severity,
            subject,
            message,
        } = event;
        match (&subject, severity) {
            (Subject::Signature(name), Severity::Info) => tracing::info!(signature = %name, "{message}"),
            (Subject::Signature(name), Severity::Warn) => tracing::warn!(signature = %name, "{message}"),
            (Subject::Signature(name), Severity::Error) => {
                tracing::error!(signature = %name, "{message}")
            }
            (Subject::Path(path), Severity::Info) => {
                tracing::info!(path = %path.display(), "{message}")
            }
            (Subject::Path(path), Severity::Warn) => {
                tracing::warn!(path = %path.display(), "{message}")
            }
            (Subject::Path(path), Severity::Error) => {
                tracing::error!(path = %path.display(), "{message}")
            }
            (Subject::Run, Severity::Info) => tracing::info!("{message}"),
            (Subject::Run, Severity::Warn) => tracing::warn!("{message}"),
            (Subject::Run, Severity::Error) => tracing::error!("{message}"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    /// Events attributed to the given signature name.
    pub fn for_signature(&self, name: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(&e.subject, Subject::Signature(n) if n == name))
            .cloned()
            .collect()
    }

    pub fn for_path(&self, path: &Path) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(&e.subject, Subject::Path(p) if p == path))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}
