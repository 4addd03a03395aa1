use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{rec_status, Recommendation, RecommendationPayload};

pub struct RecommendationRepo;

impl RecommendationRepo {
    pub async fn find_by_key(
        pool: &PgPool,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
    ) -> Result<Option<Recommendation>, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            "SELECT * FROM recommendations WHERE organization_id = $1 AND rule_id = $2 AND resource_id = $3"
        )
        .bind(org_id)
        .bind(rule_id)
        .bind(resource_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn insert_open(
        pool: &PgPool,
        org_id: Uuid,
        rule_id: &str,
        resource_id: &str,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> Result<Recommendation, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            r#"INSERT INTO recommendations (id, organization_id, rule_id, resource_id, subscription_id,
               title, description, impact_monthly, confidence, status, details)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(rule_id)
        .bind(resource_id)
        .bind(subscription_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(rust_decimal::Decimal::from_f64_retain(payload.impact_monthly).unwrap_or_default())
        .bind(rust_decimal::Decimal::from_f64_retain(payload.confidence).unwrap_or_default())
        .bind(rec_status::OPEN)
        .bind(&payload.details)
        .fetch_one(pool)
        .await
    }

    /// Refresh the descriptive fields from a new rule run. `status` is left
    /// untouched so externally-driven transitions survive; an empty
    /// subscription id is filled in, a non-empty one is kept.
    pub async fn update_descriptive(
        pool: &PgPool,
        id: Uuid,
        subscription_id: &str,
        payload: &RecommendationPayload,
    ) -> Result<Recommendation, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            r#"UPDATE recommendations SET
                   title = $1,
                   description = $2,
                   impact_monthly = $3,
                   confidence = $4,
                   details = $5,
                   subscription_id = CASE WHEN subscription_id = '' THEN $6 ELSE subscription_id END,
                   updated_at = NOW()
               WHERE id = $7
               RETURNING *"#,
        )
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(rust_decimal::Decimal::from_f64_retain(payload.impact_monthly).unwrap_or_default())
        .bind(rust_decimal::Decimal::from_f64_retain(payload.confidence).unwrap_or_default())
        .bind(&payload.details)
        .bind(subscription_id)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        status: Option<&str>,
        rule_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recommendation>, i64), sqlx::Error> {
        let mut conditions = vec!["organization_id = $1".to_string()];
        let mut idx = 2;

        if status.is_some() {
            conditions.push(format!("status = ${idx}"));
            idx += 1;
        }
        if rule_id.is_some() {
            conditions.push(format!("rule_id = ${idx}"));
        }

        let where_str = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM recommendations WHERE {where_str}");
        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_sql).bind(org_id);
        if let Some(s) = status { count_q = count_q.bind(s); }
        if let Some(r) = rule_id { count_q = count_q.bind(r); }
        let (total,) = count_q.fetch_one(pool).await?;

        let data_sql = format!(
            "SELECT * FROM recommendations WHERE {where_str} ORDER BY impact_monthly DESC LIMIT {limit} OFFSET {offset}"
        );
        let mut data_q = sqlx::query_as::<_, Recommendation>(&data_sql).bind(org_id);
        if let Some(s) = status { data_q = data_q.bind(s); }
        if let Some(r) = rule_id { data_q = data_q.bind(r); }
        let recs = data_q.fetch_all(pool).await?;

        Ok((recs, total))
    }

    pub async fn get_by_id(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Recommendation, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            "SELECT * FROM recommendations WHERE id = $1 AND organization_id = $2"
        )
        .bind(id)
        .bind(org_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        status: &str,
    ) -> Result<Recommendation, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            "UPDATE recommendations SET status = $1, updated_at = NOW() WHERE id = $2 AND organization_id = $3 RETURNING *"
        )
        .bind(status)
        .bind(id)
        .bind(org_id)
        .fetch_one(pool)
        .await
    }
}
