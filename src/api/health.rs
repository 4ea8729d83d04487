use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    database: String,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    // Check database connection
    let db_status = match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => "up",
        Err(_) => "down",
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status.to_string(),
    };

    Ok(Json(response))
}
