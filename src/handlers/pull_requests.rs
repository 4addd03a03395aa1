use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::PullRequestRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{PaginatedResponse, Pagination, PullRequestEvent};

#[derive(Debug, Deserialize)]
pub struct PullRequestQueryParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<PullRequestQueryParams>,
) -> Result<Json<PaginatedResponse<PullRequestEvent>>, AppError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20);
    let offset = (page - 1) * page_size;

    let (events, total) = PullRequestRepo::list(&state.pool, org_id, page_size, offset).await?;

    Ok(Json(PaginatedResponse {
        data: events,
        pagination: Pagination::new(page, page_size, total),
    }))
}
