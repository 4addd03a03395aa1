use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::db::RecommendationRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    OpenPrRequest, PaginatedResponse, Pagination, PullRequestEvent, Recommendation,
    RecommendationQueryParams, UpdateRecommendationStatusRequest,
};
use crate::orchestrator;

pub async fn list(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<RecommendationQueryParams>,
) -> Result<Json<PaginatedResponse<Recommendation>>, AppError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20);
    let offset = (page - 1) * page_size;

    let (recs, total) = RecommendationRepo::list(
        &state.pool,
        org_id,
        params.status.as_deref(),
        params.rule_id.as_deref(),
        page_size,
        offset,
    )
    .await?;

    Ok(Json(PaginatedResponse {
        data: recs,
        pagination: Pagination::new(page, page_size, total),
    }))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Recommendation>, AppError> {
    let rec = RecommendationRepo::get_by_id(&state.pool, org_id, id)
        .await
        .map_err(|_| AppError::not_found("Recommendation", &id.to_string()))?;
    Ok(Json(rec))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(update_req): Json<UpdateRecommendationStatusRequest>,
) -> Result<Json<Recommendation>, AppError> {
    let rec =
        RecommendationRepo::update_status(&state.pool, org_id, id, &update_req.status).await?;
    Ok(Json(rec))
}

pub async fn open_pr(
    State(state): State<AppState>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(request): Json<OpenPrRequest>,
) -> Result<Json<PullRequestEvent>, AppError> {
    let event =
        orchestrator::open_fix_pr(&state.pool, state.github.as_ref(), org_id, id, &request)
            .await
            .map_err(|e| AppError::unprocessable(e.to_string()))?;
    Ok(Json(event))
}
