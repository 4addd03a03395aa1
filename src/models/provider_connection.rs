use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProviderConnection {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider_type: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub credentials: Option<Vec<u8>>,
    pub enabled: bool,
    pub status: String,
    pub status_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProviderRequest {
    pub provider_type: String,
    pub name: String,
    pub credentials: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}
