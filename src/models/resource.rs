use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Metrics, Tags};

/// A billed infrastructure unit as persisted after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CloudResource {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Stable provider-side identifier, unique per organization.
    pub resource_id: String,
    pub name: String,
    pub resource_type: String,
    pub subscription_id: String,
    pub tags: Json<Tags>,
    pub metrics: Json<Metrics>,
    pub monthly_cost: Option<rust_decimal::Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resource as reported by the provider during a sync cycle, before it has
/// a database identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub resource_id: String,
    pub name: String,
    pub resource_type: String,
    pub subscription_id: String,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub metrics: Metrics,
    pub monthly_cost: Option<f64>,
}
