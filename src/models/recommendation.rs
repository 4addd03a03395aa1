use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recommendation lifecycle. The rule engine only ever sets `OPEN` on
/// creation; later transitions come from the PR orchestrator or review
/// events and are never regressed by a rule run.
pub mod rec_status {
    pub const OPEN: &str = "open";
    pub const IN_PR: &str = "in_pr";
    pub const MERGED: &str = "merged";
    pub const CLOSED: &str = "closed";
    pub const DISMISSED: &str = "dismissed";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recommendation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub rule_id: String,
    pub resource_id: String,
    pub subscription_id: String,
    pub title: String,
    pub description: String,
    pub impact_monthly: rust_decimal::Decimal,
    pub confidence: rust_decimal::Decimal,
    pub status: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Output of one rule evaluation for one resource. Ephemeral: the reconciler
/// folds it into a persisted `Recommendation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationPayload {
    pub title: String,
    pub description: String,
    pub impact_monthly: f64,
    pub confidence: f64,
    pub details: serde_json::Value,
}

impl RecommendationPayload {
    pub fn resource_id(&self) -> Option<&str> {
        self.details.get("resourceId").and_then(|v| v.as_str())
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.details
            .get("subscriptionId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQueryParams {
    pub status: Option<String>,
    pub rule_id: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecommendationStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenPrRequest {
    pub branch_name: Option<String>,
    pub commit_message: Option<String>,
    pub pr_title: Option<String>,
    pub pr_body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}
