use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ProviderConnection;

pub struct ProviderConnectionRepo;

impl ProviderConnectionRepo {
    pub async fn create(pool: &PgPool, conn: &ProviderConnection) -> Result<ProviderConnection, sqlx::Error> {
        sqlx::query_as::<_, ProviderConnection>(
            r#"INSERT INTO provider_connections (id, organization_id, provider_type, name, credentials, enabled, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(conn.id)
        .bind(conn.organization_id)
        .bind(&conn.provider_type)
        .bind(&conn.name)
        .bind(&conn.credentials)
        .bind(conn.enabled)
        .bind(&conn.status)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, org_id: Uuid) -> Result<Vec<ProviderConnection>, sqlx::Error> {
        sqlx::query_as::<_, ProviderConnection>(
            "SELECT * FROM provider_connections WHERE organization_id = $1 ORDER BY created_at"
        )
        .bind(org_id)
        .fetch_all(pool)
        .await
    }

    /// First enabled connection of the given provider type, if any.
    pub async fn find_enabled(
        pool: &PgPool,
        org_id: Uuid,
        provider_type: &str,
    ) -> Result<Option<ProviderConnection>, sqlx::Error> {
        sqlx::query_as::<_, ProviderConnection>(
            r#"SELECT * FROM provider_connections
               WHERE organization_id = $1 AND provider_type = $2 AND enabled = TRUE
               ORDER BY created_at
               LIMIT 1"#,
        )
        .bind(org_id)
        .bind(provider_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM provider_connections WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE provider_connections SET status = $1, status_message = $2, updated_at = NOW() WHERE id = $3"
        )
        .bind(status)
        .bind(message)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_sync_time(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE provider_connections SET last_sync_at = NOW(), updated_at = NOW() WHERE id = $1"
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
