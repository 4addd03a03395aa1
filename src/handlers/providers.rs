use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::ProviderConnectionRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{CreateProviderRequest, ProviderConnection};

pub async fn list(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<ProviderConnection>>, AppError> {
    let connections = ProviderConnectionRepo::list(&state.pool, org_id).await?;
    Ok(Json(connections))
}

pub async fn create(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(create_req): Json<CreateProviderRequest>,
) -> Result<Json<ProviderConnection>, AppError> {
    let creds_json = serde_json::to_vec(&create_req.credentials)
        .map_err(|_| AppError::bad_request("Invalid credentials format"))?;

    let sealed = crate::crypto::seal(&creds_json, &state.encryption_key)
        .map_err(|e| AppError::internal(format!("Encryption error: {e}")))?;

    let connection = ProviderConnection {
        id: Uuid::new_v4(),
        organization_id: org_id,
        provider_type: create_req.provider_type,
        name: create_req.name,
        credentials: Some(sealed),
        enabled: true,
        status: "pending".into(),
        status_message: None,
        last_sync_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    let created = ProviderConnectionRepo::create(&state.pool, &connection).await?;
    Ok(Json(created))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    ProviderConnectionRepo::delete(&state.pool, org_id, id).await?;
    Ok(Json(serde_json::json!({ "message": "Provider connection deleted" })))
}
