use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{OrgRuleConfigRow, RuleOverride};

pub struct RuleConfigRepo;

impl RuleConfigRepo {
    /// Load the organization's override map. Absent rows mean "inherit all
    /// defaults", so an empty map is a normal result.
    pub async fn load_overrides(
        pool: &PgPool,
        org_id: Uuid,
    ) -> Result<HashMap<String, RuleOverride>, sqlx::Error> {
        let rows = sqlx::query_as::<_, OrgRuleConfigRow>(
            "SELECT * FROM org_rule_configs WHERE organization_id = $1"
        )
        .bind(org_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(OrgRuleConfigRow::into_override).collect())
    }

    /// Replace the organization's override map wholesale.
    pub async fn put_overrides(
        pool: &PgPool,
        org_id: Uuid,
        overrides: &HashMap<String, RuleOverride>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM org_rule_configs WHERE organization_id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        for (rule_id, over) in overrides {
            sqlx::query(
                "INSERT INTO org_rule_configs (organization_id, rule_id, enabled, thresholds) VALUES ($1, $2, $3, $4)"
            )
            .bind(org_id)
            .bind(rule_id)
            .bind(over.enabled)
            .bind(Json(&over.thresholds))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
