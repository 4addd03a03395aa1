//! Folds freshly computed rule output into persisted recommendations without
//! duplicating records or clobbering externally-driven status transitions.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{RecommendationRepo, ResourceRepo};
use crate::models::{Recommendation, RecommendationPayload};

/// Persistence operations the reconciler needs, keyed by the unique
/// (organization, rule, resource) triple.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn find_by_key(
        &self,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
    ) -> anyhow::Result<Option<Recommendation>>;

    async fn insert_open(
        &self,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> anyhow::Result<Recommendation>;

    async fn update_descriptive(
        &self,
        id: Uuid,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> anyhow::Result<Recommendation>;

    async fn resource_subscription(
        &self,
        org_id: Uuid,
        resource_id: &str,
    ) -> anyhow::Result<Option<String>>;
}

pub struct PgRecommendationStore {
    pool: PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecommendationStore for PgRecommendationStore {
    async fn find_by_key(
        &self,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
    ) -> anyhow::Result<Option<Recommendation>> {
        Ok(RecommendationRepo::find_by_key(&self.pool, org_id, rule_id, resource_id).await?)
    }

    async fn insert_open(
        &self,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> anyhow::Result<Recommendation> {
        Ok(RecommendationRepo::insert_open(
            &self.pool,
            org_id,
            rule_id,
            resource_id,
            subscription_id,
            payload,
        )
        .await?)
    }

    async fn update_descriptive(
        &self,
        id: Uuid,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> anyhow::Result<Recommendation> {
        Ok(RecommendationRepo::update_descriptive(&self.pool, id, subscription_id, payload).await?)
    }

    async fn resource_subscription(
        &self,
        org_id: Uuid,
        resource_id: &str,
    ) -> anyhow::Result<Option<String>> {
        let resource = ResourceRepo::get_by_resource_id(&self.pool, org_id, resource_id).await?;
        Ok(resource.map(|r| r.subscription_id).filter(|s| !s.is_empty()))
    }
}

/// Upsert one rule payload. Returns None when the payload is dropped for
/// lacking a resource id.
pub async fn upsert(
    store: &dyn RecommendationStore,
    org_id: Uuid,
    rule_id: &str,
    payload: &RecommendationPayload,
) -> anyhow::Result<Option<Recommendation>> {
    let Some(resource_id) = payload.resource_id().map(str::to_string) else {
        tracing::warn!(rule_id, title = %payload.title, "Dropping payload without resourceId");
        return Ok(None);
    };

    let subscription_id = match payload.subscription_id() {
        Some(sub) => sub.to_string(),
        None => store
            .resource_subscription(org_id, &resource_id)
            .await?
            .unwrap_or_default(),
    };

    let existing = store.find_by_key(org_id, rule_id, &resource_id).await?;
    let rec = match existing {
        Some(existing) => {
            store
                .update_descriptive(existing.id, &subscription_id, payload)
                .await?
        }
        None => {
            store
                .insert_open(org_id, rule_id, &resource_id, &subscription_id, payload)
                .await?
        }
    };
    Ok(Some(rec))
}

#[cfg(test)]
pub(crate) mod mem_store {
    use super::*;
    use crate::models::rec_status;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory stand-in for the Pg store, mirroring its upsert semantics.
    #[derive(Default)]
    pub struct MemStore {
        pub records: Mutex<HashMap<(Uuid, String, String), Recommendation>>,
        pub subscriptions: HashMap<String, String>,
        /// Simulate a per-payload persistence failure for this resource id.
        pub fail_on_resource: Option<String>,
    }

    impl MemStore {
        pub async fn count(&self) -> usize {
            self.records.lock().await.len()
        }

        pub async fn get(&self, org_id: Uuid, rule_id: &str, resource_id: &str) -> Option<Recommendation> {
            self.records
                .lock()
                .await
                .get(&(org_id, rule_id.to_string(), resource_id.to_string()))
                .cloned()
        }

        pub async fn set_status(&self, org_id: Uuid, rule_id: &str, resource_id: &str, status: &str) {
            let mut records = self.records.lock().await;
            if let Some(rec) = records.get_mut(&(org_id, rule_id.to_string(), resource_id.to_string())) {
                rec.status = status.to_string();
            }
        }
    }

    fn decimal(value: f64) -> rust_decimal::Decimal {
        rust_decimal::Decimal::from_f64_retain(value).unwrap_or_default()
    }

    #[async_trait]
    impl RecommendationStore for MemStore {
        async fn find_by_key(
            &self,
            org_id: Uuid,
            rule_id: &str,
            resource_id: &str,
        ) -> anyhow::Result<Option<Recommendation>> {
            Ok(self.get(org_id, rule_id, resource_id).await)
        }

        async fn insert_open(
            &self,
            org_id: Uuid,
            rule_id: &str,
            resource_id: &str,
            subscription_id: &str,
            payload: &RecommendationPayload,
        ) -> anyhow::Result<Recommendation> {
            if self.fail_on_resource.as_deref() == Some(resource_id) {
                anyhow::bail!("storage unavailable");
            }
            let rec = Recommendation {
                id: Uuid::new_v4(),
                organization_id: org_id,
                rule_id: rule_id.to_string(),
                resource_id: resource_id.to_string(),
                subscription_id: subscription_id.to_string(),
                title: payload.title.clone(),
                description: payload.description.clone(),
                impact_monthly: decimal(payload.impact_monthly),
                confidence: decimal(payload.confidence),
                status: rec_status::OPEN.into(),
                details: payload.details.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.records.lock().await.insert(
                (org_id, rule_id.to_string(), resource_id.to_string()),
                rec.clone(),
            );
            Ok(rec)
        }

        async fn update_descriptive(
            &self,
            id: Uuid,
            subscription_id: &str,
            payload: &RecommendationPayload,
        ) -> anyhow::Result<Recommendation> {
            let mut records = self.records.lock().await;
            let rec = records
                .values_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow::anyhow!("record {id} not found"))?;
            rec.title = payload.title.clone();
            rec.description = payload.description.clone();
            rec.impact_monthly = decimal(payload.impact_monthly);
            rec.confidence = decimal(payload.confidence);
            rec.details = payload.details.clone();
            if rec.subscription_id.is_empty() {
                rec.subscription_id = subscription_id.to_string();
            }
            rec.updated_at = Utc::now();
            Ok(rec.clone())
        }

        async fn resource_subscription(
            &self,
            _org_id: Uuid,
            resource_id: &str,
        ) -> anyhow::Result<Option<String>> {
            Ok(self.subscriptions.get(resource_id).cloned())
        }
    }
}
