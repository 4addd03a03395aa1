use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::OrgRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::sync::{self, CycleSummary};

/// Run the daily cycle on demand. Individual step failures land in the
/// summary, never in the response status.
pub async fn run(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<CycleSummary>, AppError> {
    OrgRepo::get_by_id(&state.pool, org_id)
        .await
        .map_err(|_| AppError::not_found("Organization", &org_id.to_string()))?;

    let summary = sync::run_daily_cycle(&state.pool, &state.encryption_key, org_id).await;
    Ok(Json(summary))
}
