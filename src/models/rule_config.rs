use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Per-organization override of a rule's default configuration. Unset keys
/// inherit the rule's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub thresholds: HashMap<String, f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrgRuleConfigRow {
    pub organization_id: Uuid,
    pub rule_id: String,
    pub enabled: Option<bool>,
    pub thresholds: Json<HashMap<String, f64>>,
}

impl OrgRuleConfigRow {
    pub fn into_override(self) -> (String, RuleOverride) {
        (
            self.rule_id,
            RuleOverride {
                enabled: self.enabled,
                thresholds: self.thresholds.0,
            },
        )
    }
}
