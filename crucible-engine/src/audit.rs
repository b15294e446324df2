//! Audit capability
//!
//! Records admission and execution decisions. Fire-and-forget from the
//! engine's perspective: a failed audit write is logged and the use case
//! carries on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    AdmissionGranted,
    AdmissionDenied,
    RunSucceeded,
    RunFailed,
    RunCancelled,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub tenant_id: String,
    /// Task or run the decision concerns.
    pub resource_id: Uuid,
    pub detail: serde_json::Value,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        tenant_id: impl Into<String>,
        resource_id: Uuid,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            tenant_id: tenant_id.into(),
            resource_id,
            detail,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// Capability interface for recording audit events.
#[async_trait]
pub trait AuditService: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), String>;
}

/// Audit sink that emits events as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditService;

#[async_trait]
impl AuditService for TracingAuditService {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        tracing::info!(
            kind = ?event.kind,
            tenant_id = %event.tenant_id,
            resource_id = %event.resource_id,
            detail = %event.detail,
            "audit event"
        );
        Ok(())
    }
}

/// Records an audit event, logging instead of failing if the sink errors.
pub(crate) async fn record_best_effort(audit: &dyn AuditService, event: AuditEvent) {
    if let Err(e) = audit.record(event).await {
        tracing::warn!("failed to record audit event: {}", e);
    }
}
