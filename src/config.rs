//! Run configuration

use serde::{Deserialize, Serialize};

use crate::compiler::Anchoring;
use crate::engine::EngineKind;
use crate::error::{Result, ScanError};

/// Default ceiling on a single file's size (512 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Names and thresholds used by the container correction passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPolicy {
    /// Generic container every derived format also matches
    pub container: String,
    /// Formats that are structurally instances of `container`
    pub derived: Vec<String>,
    /// Moved to `embedded_counts` whenever a derived format is present
    pub embedded: Vec<String>,
    /// Moved only when their count exceeds `image_threshold`
    pub thresholded: Vec<String>,
    pub image_threshold: u64,
}

impl Default for ContainerPolicy {
    fn default() -> Self {
        let names = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            container: "ZIP".to_string(),
            derived: names(&["DOCX", "XLSX", "PPTX"]),
            embedded: names(&["XML", "HTML", "JSON", "GIF", "BMP"]),
            thresholded: names(&["PNG", "JPG"]),
            image_threshold: 2,
        }
    }
}

/// Scan options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub engine: EngineKind,
    pub workers: usize,
    pub max_file_size: u64,
    pub anchoring: Anchoring,
    pub container: ContainerPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            workers: num_cpus::get(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            anchoring: Anchoring::default(),
            container: ContainerPolicy::default(),
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_anchoring(mut self, anchoring: Anchoring) -> Self {
        self.anchoring = anchoring;
        self
    }

    pub fn with_container_policy(mut self, policy: ContainerPolicy) -> Self {
        self.container = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ScanError::InvalidConfig("worker count must be at least 1".into()));
        }
        if self.max_file_size == 0 {
            return Err(ScanError::InvalidConfig("max file size must be non-zero".into()));
        }
        if !self.engine.is_available() {
            return Err(ScanError::EngineUnavailable(self.engine));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.max_file_size, 512 * 1024 * 1024);
        assert_eq!(config.engine, EngineKind::TwoPhase);
        assert_eq!(config.anchoring, Anchoring::Start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = ScanConfig::new().with_workers(0);
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

        let config = ScanConfig::new().with_workers(2).with_max_file_size(0);
        assert!(config.validate().is_err());

        let config = ScanConfig::new()
            .with_engine(EngineKind::Backtrack)
            .with_anchoring(Anchoring::Unanchored);
        assert_eq!(config.engine, EngineKind::Backtrack);
        assert_eq!(config.anchoring, Anchoring::Unanchored);
    }
}
