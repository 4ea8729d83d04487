use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::error;

use crate::api::auth::require_bearer;
use crate::api::routes::AppState;
use crate::domain::event::EventType;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    event: String,
    data: serde_json::Value,
}

/// Event trigger intake for the rest of the platform. Fan-out runs in a
/// spawned task so intake latency never includes outbound HTTP time.
pub async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IngestEventRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let event = EventType::parse(&payload.event)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown event type: {}", payload.event)))?;

    let service = state.delivery_service.clone();
    let data = payload.data;
    tokio::spawn(async move {
        if let Err(e) = service.notify(event, data).await {
            error!(event = %event, error = %e, "Event fan-out failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "event": event, "status": "accepted" })),
    ))
}
