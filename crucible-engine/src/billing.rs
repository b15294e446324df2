//! Billing capability
//!
//! The engine only ever asks billing one question: what is this tenant's
//! balance right now. Eligibility is decided by the use cases, never by a
//! `BillingClient` implementation, so the admission policy stays centralized
//! and testable independent of transport.

use async_trait::async_trait;
use thiserror::Error;

use crucible_core::Credits;

/// Errors a billing client can surface.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    /// Transport-level failure (network error, timeout, 5xx). Transient.
    #[error("billing service unavailable: {0}")]
    Unavailable(String),

    /// Billing has no record of the tenant. Permanent until reconfigured.
    #[error("tenant {0} unknown to billing service")]
    TenantNotFound(String),
}

/// Capability interface to the billing service.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Current credit balance for a tenant.
    async fn get_balance(&self, tenant_id: &str) -> Result<Credits, BillingError>;
}
