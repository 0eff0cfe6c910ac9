use thiserror::Error;

use crate::engine::EngineKind;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid signature file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No usable signatures after loading")]
    NoUsableSignatures,

    #[error("{engine} failed to compile pattern database: {reason}")]
    PatternCompile { engine: EngineKind, reason: String },

    #[error("Engine {0} is not available in this build")]
    EngineUnavailable(EngineKind),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

pub type Result<T> = std::result::Result<T, ScanError>;
