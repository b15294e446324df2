//! Crucible Billing Client
//!
//! HTTP client for the billing service, implementing the engine's
//! [`BillingClient`] capability. The billing service is the sole authority on
//! credit balances; this crate only fetches and translates, it never caches.
//!
//! # Example
//!
//! ```no_run
//! use crucible_billing::HttpBillingClient;
//! use crucible_engine::billing::BillingClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpBillingClient::new("http://localhost:9090")?;
//!     match client.get_balance("tenant-a").await {
//!         Ok(balance) => println!("balance: {}", balance),
//!         Err(e) => eprintln!("billing error: {}", e),
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crucible_core::Credits;
use crucible_engine::billing::{BillingClient, BillingError};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total attempts per balance fetch, including the first.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Balance document returned by the billing service.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub tenant_id: String,
    pub balance: Credits,
    pub last_updated: Option<DateTime<Utc>>,
}

/// HTTP client for the billing service's balance API.
#[derive(Debug, Clone)]
pub struct HttpBillingClient {
    /// Base URL of the billing service (e.g., "http://localhost:9090")
    base_url: String,
    /// HTTP client instance
    client: Client,
    max_attempts: u32,
}

impl HttpBillingClient {
    /// Create a client with the default timeout and retry policy.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a client around a pre-configured reqwest [`Client`].
    ///
    /// Use this to set custom timeouts, proxies or TLS settings.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the total attempt count (including the first try).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Get the base URL of the billing service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_balance(&self, tenant_id: &str) -> Result<BalanceResponse, BillingError> {
        let url = format!("{}/billing/balance/{}", self.base_url, tenant_id);
        let response = self.client.get(&url).send().await.map_err(|e| {
            BillingError::Unavailable(format!("request to billing service failed: {}", e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BillingError::TenantNotFound(tenant_id.to_string())),
            status if !status.is_success() => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(BillingError::Unavailable(format!(
                    "billing service returned status {}: {}",
                    status, body
                )))
            }
            _ => response.json::<BalanceResponse>().await.map_err(|e| {
                BillingError::Unavailable(format!("invalid balance response: {}", e))
            }),
        }
    }
}

#[async_trait]
impl BillingClient for HttpBillingClient {
    /// Fetch the tenant's current balance, retrying transient failures.
    ///
    /// A 404 (`TenantNotFound`) is definitive and never retried. Timeouts,
    /// connection errors and 5xx responses are retried with exponential
    /// backoff (1s, 2s, ...) before surfacing as `Unavailable`.
    async fn get_balance(&self, tenant_id: &str) -> Result<Credits, BillingError> {
        let mut attempt = 0;
        loop {
            match self.fetch_balance(tenant_id).await {
                Ok(response) => return Ok(response.balance),
                Err(e @ BillingError::TenantNotFound(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    warn!(
                        tenant_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "billing request failed, retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }
}

/// Delay before the attempt following `attempt` failures: 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt - 1).min(6))
}
