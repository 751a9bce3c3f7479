//! Engine options: pass threshold and blocker behaviour

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Weighted score below this fails the run (0.0 to 1.0)
    #[serde(default = "default_threshold")]
    pub pass_score_threshold: f64,

    /// A failed BLOCKER rule fails the run regardless of score
    #[serde(default = "default_true")]
    pub blocker_failure_forces_fail: bool,
}

fn default_threshold() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl EngineOptions {
    /// Strict defaults: every weighted rule must pass
    pub fn strict() -> Self {
        Self {
            pass_score_threshold: 1.0,
            blocker_failure_forces_fail: true,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.pass_score_threshold = threshold;
        self
    }

    pub fn without_blocker_override(mut self) -> Self {
        self.blocker_failure_forces_fail = false;
        self
    }

    /// Load options from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| e.to_string())
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::strict()
    }
}
