use sqlx::PgPool;
use uuid::Uuid;

use crate::azure::ProviderClient;

/// Shared context handed to every rule executor in a run.
pub struct RuleContext<'a> {
    pub org_id: Uuid,
    pub pool: &'a PgPool,
    pub provider: &'a dyn ProviderClient,
}
