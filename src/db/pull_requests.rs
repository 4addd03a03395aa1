use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PullRequestEvent;

pub struct PullRequestRepo;

impl PullRequestRepo {
    pub async fn create(pool: &PgPool, event: &PullRequestEvent) -> Result<PullRequestEvent, sqlx::Error> {
        sqlx::query_as::<_, PullRequestEvent>(
            r#"INSERT INTO pull_request_events (id, organization_id, recommendation_id, provider, repo, pr_number, branch, status, url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(event.id)
        .bind(event.organization_id)
        .bind(event.recommendation_id)
        .bind(&event.provider)
        .bind(&event.repo)
        .bind(event.pr_number)
        .bind(&event.branch)
        .bind(&event.status)
        .bind(&event.url)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, org_id: Uuid, limit: i64, offset: i64) -> Result<(Vec<PullRequestEvent>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pull_request_events WHERE organization_id = $1"
        )
        .bind(org_id)
        .fetch_one(pool)
        .await?;

        let events = sqlx::query_as::<_, PullRequestEvent>(
            "SELECT * FROM pull_request_events WHERE organization_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((events, total))
    }
}
