use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::require_bearer;
use crate::api::routes::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListDeliveriesQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Per-subscription delivery history, newest first, with the full attempt
/// log for diagnosing failed deliveries.
pub async fn list_deliveries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<ListDeliveriesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let deliveries = state
        .delivery_service
        .delivery_repository()
        .list_for_subscription(id, limit, offset)
        .await?;

    Ok(Json(serde_json::json!({ "deliveries": deliveries })))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let delivery = state
        .delivery_service
        .delivery_repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery record not found: {}", id)))?;

    Ok(Json(serde_json::json!({ "delivery": delivery })))
}

/// On-demand retry sweep, authenticated with the sweep token. Also invoked
/// on a schedule by the background sweeper.
pub async fn trigger_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.sweep_token)?;

    let processed = state.delivery_service.sweep().await?;

    Ok(Json(serde_json::json!({ "processed": processed })))
}
