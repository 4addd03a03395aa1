use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CloudResource, DiscoveredResource, Tags};

pub struct ResourceRepo;

impl ResourceRepo {
    /// Upsert a provider-reported resource by its stable (org, resource_id)
    /// key. Tags, metrics and cost are refreshed on every sync cycle.
    pub async fn upsert(
        pool: &PgPool,
        org_id: Uuid,
        discovered: &DiscoveredResource,
    ) -> Result<CloudResource, sqlx::Error> {
        let cost = discovered
            .monthly_cost
            .and_then(rust_decimal::Decimal::from_f64_retain);

        sqlx::query_as::<_, CloudResource>(
            r#"INSERT INTO resources (id, organization_id, resource_id, name, resource_type, subscription_id, tags, metrics, monthly_cost)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (organization_id, resource_id) DO UPDATE SET
                   name = EXCLUDED.name,
                   resource_type = EXCLUDED.resource_type,
                   subscription_id = EXCLUDED.subscription_id,
                   tags = EXCLUDED.tags,
                   metrics = EXCLUDED.metrics,
                   monthly_cost = EXCLUDED.monthly_cost,
                   updated_at = NOW()
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(&discovered.resource_id)
        .bind(&discovered.name)
        .bind(&discovered.resource_type)
        .bind(&discovered.subscription_id)
        .bind(Json(&discovered.tags))
        .bind(Json(&discovered.metrics))
        .bind(cost)
        .fetch_one(pool)
        .await
    }

    /// Drop resources the provider no longer reports. Returns the number of
    /// rows removed.
    pub async fn delete_not_in(
        pool: &PgPool,
        org_id: Uuid,
        keep_resource_ids: &[String],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM resources WHERE organization_id = $1 AND NOT (resource_id = ANY($2))"
        )
        .bind(org_id)
        .bind(keep_resource_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_by_type(
        pool: &PgPool,
        org_id: Uuid,
        resource_type: &str,
    ) -> Result<Vec<CloudResource>, sqlx::Error> {
        sqlx::query_as::<_, CloudResource>(
            "SELECT * FROM resources WHERE organization_id = $1 AND resource_type = $2 ORDER BY name"
        )
        .bind(org_id)
        .bind(resource_type)
        .fetch_all(pool)
        .await
    }

    pub async fn get_by_resource_id(
        pool: &PgPool,
        org_id: Uuid,
        resource_id: &str,
    ) -> Result<Option<CloudResource>, sqlx::Error> {
        sqlx::query_as::<_, CloudResource>(
            "SELECT * FROM resources WHERE organization_id = $1 AND resource_id = $2"
        )
        .bind(org_id)
        .bind(resource_id)
        .fetch_optional(pool)
        .await
    }

    /// Merge mapping metadata keys into a resource's tag map, keeping all
    /// existing tags.
    pub async fn merge_tags(
        pool: &PgPool,
        org_id: Uuid,
        resource_id: &str,
        extra: &Tags,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE resources SET tags = tags || $3::jsonb, updated_at = NOW() WHERE organization_id = $1 AND resource_id = $2"
        )
        .bind(org_id)
        .bind(resource_id)
        .bind(Json(extra))
        .execute(pool)
        .await?;
        Ok(())
    }
}
