//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use uuid::Uuid;

use crate::azure::{ProviderClient, ProviderError};
use crate::models::{
    rec_status, CloudResource, DiscoveredResource, Metrics, Recommendation, Tags,
};

fn tag_map(tags: &[(&str, &str)]) -> Tags {
    tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn metric_map(metrics: &[(&str, f64)]) -> Metrics {
    metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn resource(
    resource_id: &str,
    resource_type: &str,
    tags: &[(&str, &str)],
    metrics: &[(&str, f64)],
) -> CloudResource {
    CloudResource {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        resource_id: resource_id.to_string(),
        name: resource_id.to_string(),
        resource_type: resource_type.to_string(),
        subscription_id: "sub-1".into(),
        tags: Json(tag_map(tags)),
        metrics: Json(metric_map(metrics)),
        monthly_cost: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

impl CloudResource {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

pub fn discovered(
    resource_id: &str,
    resource_type: &str,
    tags: &[(&str, &str)],
    metrics: &[(&str, f64)],
) -> DiscoveredResource {
    DiscoveredResource {
        resource_id: resource_id.to_string(),
        name: resource_id.to_string(),
        resource_type: resource_type.to_string(),
        subscription_id: "sub-1".into(),
        tags: tag_map(tags),
        metrics: metric_map(metrics),
        monthly_cost: None,
    }
}

pub fn recommendation(title: &str, impact_monthly: f64) -> Recommendation {
    Recommendation {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        rule_id: "azure.vm.rightsize".into(),
        resource_id: "vm-1".into(),
        subscription_id: "sub-1".into(),
        title: title.to_string(),
        description: "desc".into(),
        impact_monthly: rust_decimal::Decimal::from_f64_retain(impact_monthly).unwrap_or_default(),
        confidence: rust_decimal::Decimal::from_f64_retain(0.85).unwrap_or_default(),
        status: rec_status::OPEN.into(),
        details: json!({ "resourceId": "vm-1", "repo": "acme/infra" }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Provider that reports nothing; for tests exercising control flow only.
pub struct NullProvider;

#[async_trait]
impl ProviderClient for NullProvider {
    async fn list_resources_of_type(
        &self,
        _resource_type: &str,
    ) -> Result<Vec<DiscoveredResource>, ProviderError> {
        Ok(vec![])
    }

    async fn get_metric_average(
        &self,
        _resource_id: &str,
        _metric_name: &str,
        _lookback_days: u32,
    ) -> Result<Option<f64>, ProviderError> {
        Ok(None)
    }

    async fn get_monthly_spend(&self, _scope: &str) -> Result<f64, ProviderError> {
        Ok(0.0)
    }

    async fn list_unattached_disks(&self) -> Result<Vec<DiscoveredResource>, ProviderError> {
        Ok(vec![])
    }
}
