//! External collaborators of the orchestrator
//!
//! Every seam is an object-safe async trait so deployments can plug in
//! object storage, a secret manager or real connectors while tests use the
//! in-memory implementations below.

use crate::audit::AuditEntry;
use crate::run::{InputSource, Run};
use async_trait::async_trait;
use parking_lot::RwLock;
use qc_core::{AiSignals, NormalizedInput};
use qc_engine::RuleSnapshot;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient; the run may be retried
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Misconfiguration that a retry will not fix
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}

#[async_trait]
pub trait InputLoader: Send + Sync {
    /// Parse the source into the engine's input shape
    async fn load(&self, source: &InputSource) -> Result<NormalizedInput, CollaboratorError>;

    /// Raw stored bytes, used to recompute the upload fingerprint
    async fn raw_bytes(&self, storage_path: &str) -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait SecretAccessor: Send + Sync {
    async fn get(&self, secret_ref: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn fetch(
        &self,
        config: &Value,
        credentials: &str,
        query: Option<&Value>,
    ) -> Result<NormalizedInput, CollaboratorError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `None` when the template version does not exist for the tenant
    async fn rule_snapshot(
        &self,
        tenant_id: &str,
        template_id: &str,
        template_version_id: &str,
    ) -> Result<Option<RuleSnapshot>, CollaboratorError>;
}

/// Supplies AI classifier output for one evaluated text
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn signals(&self, run: &Run, text: &str) -> Result<Option<AiSignals>, CollaboratorError>;
}

/// Connectors keyed by integration type
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connector(mut self, integration_type: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(integration_type.into(), connector);
        self
    }

    pub fn get(&self, integration_type: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(integration_type).cloned()
    }

    pub fn integration_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Uploads held in memory, keyed by storage path
#[derive(Debug, Default)]
pub struct MemoryInputLoader {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryInputLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, storage_path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.blobs.write().insert(storage_path.into(), bytes.into());
    }
}

/// Uploaded bytes are a JSON-encoded input when they parse as one,
/// otherwise UTF-8 text.
fn parse_upload(bytes: &[u8]) -> Result<NormalizedInput, CollaboratorError> {
    if let Ok(input) = serde_json::from_slice::<NormalizedInput>(bytes) {
        return Ok(input);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CollaboratorError::InvalidInput("upload is neither JSON input nor UTF-8 text".into()))?;
    Ok(NormalizedInput::text(text))
}

#[async_trait]
impl InputLoader for MemoryInputLoader {
    async fn load(&self, source: &InputSource) -> Result<NormalizedInput, CollaboratorError> {
        match source {
            InputSource::Inline { input } => Ok(input.clone()),
            InputSource::Upload { storage_path } => {
                let bytes = self.raw_bytes(storage_path).await?;
                parse_upload(&bytes)
            }
            InputSource::Integration { .. } => Err(CollaboratorError::Configuration(
                "integration inputs are fetched through a connector".into(),
            )),
        }
    }

    async fn raw_bytes(&self, storage_path: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.blobs
            .read()
            .get(storage_path)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(storage_path.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemorySecretAccessor {
    secrets: HashMap<String, String>,
}

impl MemorySecretAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret_ref: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(secret_ref.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretAccessor for MemorySecretAccessor {
    async fn get(&self, secret_ref: &str) -> Result<String, CollaboratorError> {
        self.secrets
            .get(secret_ref)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("secret {}", secret_ref)))
    }
}

/// Snapshots keyed by tenant, template and template version id
#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
    snapshots: RwLock<HashMap<(String, String, String), RuleSnapshot>>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        tenant_id: impl Into<String>,
        template_id: impl Into<String>,
        template_version_id: impl Into<String>,
        snapshot: RuleSnapshot,
    ) {
        self.snapshots.write().insert(
            (tenant_id.into(), template_id.into(), template_version_id.into()),
            snapshot,
        );
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait]
impl SnapshotSource for MemorySnapshotSource {
    async fn rule_snapshot(
        &self,
        tenant_id: &str,
        template_id: &str,
        template_version_id: &str,
    ) -> Result<Option<RuleSnapshot>, CollaboratorError> {
        let key = (
            tenant_id.to_string(),
            template_id.to_string(),
            template_version_id.to_string(),
        );
        Ok(self.snapshots.read().get(&key).cloned())
    }
}
