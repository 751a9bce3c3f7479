//! Audit trail for run outcomes

use crate::collaborators::{AuditSink, CollaboratorError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Resource type recorded for run events
pub const RUN_RESOURCE: &str = "qc_run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RunSucceeded,
    RunFailed,
    RunCancelled,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuditAction::RunSucceeded => write!(f, "RUN_SUCCEEDED"),
            AuditAction::RunFailed => write!(f, "RUN_FAILED"),
            AuditAction::RunCancelled => write!(f, "RUN_CANCELLED"),
        }
    }
}

/// An audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: String,

    pub timestamp: DateTime<Utc>,

    pub tenant_id: String,

    /// Who triggered the run; `system` when unknown
    pub actor_id: String,

    pub action: AuditAction,

    pub resource_type: String,

    pub resource_id: String,

    /// Outcome details; never secrets or raw input
    #[serde(default)]
    pub meta: Value,
}

impl AuditEntry {
    pub fn new(
        tenant_id: impl Into<String>,
        action: AuditAction,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tenant_id: tenant_id.into(),
            actor_id: "system".to_string(),
            action,
            resource_type: RUN_RESOURCE.to_string(),
            resource_id: resource_id.into(),
            meta: Value::Null,
        }
    }

    /// Set the actor
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_id = actor.into();
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Audit log collector
#[derive(Debug)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    max_entries: usize,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    /// Create with a custom max size
    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: max,
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Get entries for a specific run
    pub fn entries_for_resource(&self, resource_id: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect()
    }

    pub fn entries_for_tenant(&self, tenant_id: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), CollaboratorError> {
        let mut entries = self.entries.lock();
        entries.push(entry);

        // Trim if over limit
        if entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(0..drain_count);
        }
        Ok(())
    }
}

/// Writes audit entries to the `audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), CollaboratorError> {
        tracing::info!(
            target: "audit",
            id = %entry.id,
            tenant_id = %entry.tenant_id,
            actor_id = %entry.actor_id,
            action = %entry.action,
            resource_id = %entry.resource_id,
            meta = %entry.meta,
            "audit"
        );
        Ok(())
    }
}
