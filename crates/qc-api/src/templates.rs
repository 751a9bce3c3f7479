//! Template catalogue loaded from YAML
//!
//! ```yaml
//! templates:
//!   - tenantId: acme
//!     templateId: support-qc
//!     templateVersionId: support-qc-v3
//!     rules:
//!       - ruleId: greeting
//!         version: 1
//!         name: Greets the customer
//!         severity: MAJOR
//!         type: TEXT_REQUIRED_PHRASE
//!         params: { phrase: hello }
//! ```
//!
//! Rules are admitted while parsing, so a catalogue with an invalid rule
//! never loads.

use qc_engine::RuleSnapshot;
use qc_runs::MemorySnapshotSource;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse templates: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("template version {0} is defined more than once")]
    DuplicateVersion(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub tenant_id: String,
    pub template_id: String,
    pub template_version_id: String,
    pub rules: RuleSnapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
}

impl TemplateCatalog {
    pub fn from_yaml(yaml: &str) -> Result<Self, TemplateError> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        let mut seen = HashSet::new();
        for entry in &catalog.templates {
            let key = (&entry.tenant_id, &entry.template_id, &entry.template_version_id);
            if !seen.insert(key) {
                return Err(TemplateError::DuplicateVersion(entry.template_version_id.clone()));
            }
        }
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn into_source(self) -> MemorySnapshotSource {
        let source = MemorySnapshotSource::new();
        for entry in self.templates {
            source.insert(
                entry.tenant_id,
                entry.template_id,
                entry.template_version_id,
                entry.rules,
            );
        }
        source
    }
}
