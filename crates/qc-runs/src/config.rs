//! Orchestrator configuration

use qc_engine::EngineOptions;
use qc_segment::SegmenterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub engine: EngineOptions,

    /// Split pasted text into chats before evaluating
    #[serde(default = "default_true")]
    pub segmentation_enabled: bool,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// Writes per chunk in the two-phase path; defaults to the store ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            engine: EngineOptions::default(),
            segmentation_enabled: true,
            segmenter: SegmenterConfig::default(),
            chunk_size: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.engine.pass_score_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "engine.passScoreThreshold must be in [0, 1], got {}",
                threshold
            )));
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::Invalid("chunkSize must be positive".into()));
        }
        if self.segmenter.min_segment_chars == 0 {
            return Err(ConfigError::Invalid(
                "segmenter.minSegmentChars must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Effective chunk size against a store ceiling
    pub fn chunk_size_for(&self, ceiling: usize) -> usize {
        self.chunk_size.unwrap_or(ceiling).clamp(1, ceiling.max(1))
    }

    pub fn without_segmentation(mut self) -> Self {
        self.segmentation_enabled = false;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_defaults() {
        let config = OrchestratorConfig::from_yaml(
            "engine:\n  passScoreThreshold: 0.9\nsegmenter:\n  minSegmentChars: 200\n",
        )
        .unwrap();
        assert_eq!(config.engine.pass_score_threshold, 0.9);
        assert!(config.engine.blocker_failure_forces_fail);
        assert!(config.segmentation_enabled);
        assert_eq!(config.segmenter.min_segment_chars, 200);
        assert_eq!(config.segmenter.speaker_lookahead, 4);
        assert_eq!(config.chunk_size_for(500), 500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            OrchestratorConfig::from_yaml("engine:\n  passScoreThreshold: 1.5\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            OrchestratorConfig::from_yaml("chunkSize: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            OrchestratorConfig::from_yaml("segmentationEnabled: [\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_chunk_size_capped_by_ceiling() {
        let config = OrchestratorConfig::default().with_chunk_size(1000);
        assert_eq!(config.chunk_size_for(500), 500);
        assert_eq!(config.clone().with_chunk_size(50).chunk_size_for(500), 50);
    }
}
