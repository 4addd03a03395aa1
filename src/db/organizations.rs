use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Organization;

pub struct OrgRepo;

impl OrgRepo {
    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Organization, sqlx::Error> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations ORDER BY name")
            .fetch_all(pool)
            .await
    }
}
