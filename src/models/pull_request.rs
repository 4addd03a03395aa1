use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable audit record written once per successfully opened pull request.
/// Later lifecycle transitions (merged, closed) are recorded elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PullRequestEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub recommendation_id: Uuid,
    pub provider: String,
    pub repo: String,
    pub pr_number: i64,
    pub branch: String,
    pub status: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
