use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::RuleConfigRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::RuleOverride;
use crate::rules::{catalog, resolve_active_rules};

pub async fn get_overrides(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<HashMap<String, RuleOverride>>, AppError> {
    let overrides = RuleConfigRepo::load_overrides(&state.pool, org_id).await?;
    Ok(Json(overrides))
}

pub async fn put_overrides(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(overrides): Json<HashMap<String, RuleOverride>>,
) -> Result<Json<HashMap<String, RuleOverride>>, AppError> {
    let known: Vec<&str> = catalog().iter().map(|def| def.id).collect();
    if let Some(unknown) = overrides.keys().find(|id| !known.contains(&id.as_str())) {
        return Err(AppError::bad_request(format!("unknown rule id '{unknown}'")));
    }

    RuleConfigRepo::put_overrides(&state.pool, org_id, &overrides).await?;
    Ok(Json(overrides))
}

/// The rule set as it would run for this organization, with overrides merged
/// onto catalog defaults.
pub async fn list_effective(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let overrides = RuleConfigRepo::load_overrides(&state.pool, org_id).await?;
    let active = resolve_active_rules(catalog(), &overrides);

    let rules: Vec<serde_json::Value> = active
        .iter()
        .map(|rule| {
            serde_json::json!({
                "id": rule.id,
                "label": rule.label,
                "enabled": true,
                "thresholds": rule.settings.thresholds,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "rules": rules })))
}
