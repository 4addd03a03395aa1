mod client;
mod token;

pub use client::AzureClient;
pub use token::TokenCache;

use async_trait::async_trait;

use crate::models::DiscoveredResource;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider authentication failed: {0}")]
    Auth(String),
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Transient failures are recoverable by falling back to cached metric
    /// data; everything else is surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Read access to the cloud provider. `Ok(None)` from a metric query means
/// "no data", which is distinct from a transient failure.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn list_resources_of_type(
        &self,
        resource_type: &str,
    ) -> Result<Vec<DiscoveredResource>, ProviderError>;

    async fn get_metric_average(
        &self,
        resource_id: &str,
        metric_name: &str,
        lookback_days: u32,
    ) -> Result<Option<f64>, ProviderError>;

    async fn get_monthly_spend(&self, scope: &str) -> Result<f64, ProviderError>;

    async fn list_unattached_disks(&self) -> Result<Vec<DiscoveredResource>, ProviderError>;
}
