use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::require_bearer;
use crate::api::routes::AppState;
use crate::domain::event::EventType;
use crate::domain::subscription::{RetryPolicy, Subscription};
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListWebhooksQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    name: String,
    url: String,
    secret: String,
    events: Vec<String>,
    created_by: Option<Uuid>,
    headers: Option<HashMap<String, String>>,
    active: Option<bool>,
    retry_policy: Option<RetryPolicy>,
    timeout_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebhookRequest {
    name: Option<String>,
    url: Option<String>,
    secret: Option<String>,
    events: Option<Vec<String>>,
    headers: Option<HashMap<String, String>>,
    active: Option<bool>,
    retry_policy: Option<RetryPolicy>,
    timeout_ms: Option<i64>,
}

/// Parse dotted event names, rejecting unknown ones up front.
fn parse_events(names: &[String]) -> Result<Vec<EventType>, AppError> {
    names
        .iter()
        .map(|name| {
            EventType::parse(name)
                .ok_or_else(|| AppError::InvalidInput(format!("unknown event type: {}", name)))
        })
        .collect()
}

/// Serialize a subscription with its derived success rate.
fn subscription_json(sub: &Subscription) -> Result<serde_json::Value, AppError> {
    let mut value = serde_json::to_value(sub)
        .map_err(|e| AppError::Internal(format!("failed to serialize subscription: {}", e)))?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "success_rate".to_string(),
            serde_json::json!(sub.success_rate()),
        );
    }
    Ok(value)
}

pub async fn list_webhooks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListWebhooksQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let subscriptions = state
        .delivery_service
        .subscription_repository()
        .list(limit, offset)
        .await?;

    let webhooks = subscriptions
        .iter()
        .map(subscription_json)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(serde_json::json!({ "webhooks": webhooks })))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let subscription = state
        .delivery_service
        .subscription_repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Webhook not found: {}", id)))?;

    Ok(Json(serde_json::json!({
        "webhook": subscription_json(&subscription)?
    })))
}

pub async fn create_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let events = parse_events(&payload.events)?;

    let mut subscription = Subscription::new(
        payload.created_by.unwrap_or_else(Uuid::nil),
        payload.name,
        payload.url,
        payload.secret,
        events,
    );
    if let Some(custom_headers) = payload.headers {
        subscription.headers = custom_headers;
    }
    if let Some(active) = payload.active {
        subscription.active = active;
    }
    if let Some(retry_policy) = payload.retry_policy {
        subscription.retry_policy = retry_policy;
    }
    if let Some(timeout_ms) = payload.timeout_ms {
        subscription.timeout_ms = timeout_ms;
    }

    subscription.validate()?;

    state
        .delivery_service
        .subscription_repository()
        .create(&subscription)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "webhook": subscription_json(&subscription)?
        })),
    ))
}

pub async fn update_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWebhookRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let repo = state.delivery_service.subscription_repository();
    let mut subscription = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Webhook not found: {}", id)))?;

    if let Some(name) = payload.name {
        subscription.name = name;
    }
    if let Some(url) = payload.url {
        subscription.url = url;
    }
    if let Some(secret) = payload.secret {
        subscription.secret = secret;
    }
    if let Some(events) = payload.events {
        subscription.events = parse_events(&events)?;
    }
    if let Some(custom_headers) = payload.headers {
        subscription.headers = custom_headers;
    }
    if let Some(active) = payload.active {
        subscription.active = active;
    }
    if let Some(retry_policy) = payload.retry_policy {
        subscription.retry_policy = retry_policy;
    }
    if let Some(timeout_ms) = payload.timeout_ms {
        subscription.timeout_ms = timeout_ms;
    }

    subscription.validate()?;
    repo.update(&subscription).await?;

    Ok(Json(serde_json::json!({
        "webhook": subscription_json(&subscription)?
    })))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let deleted = state
        .delivery_service
        .subscription_repository()
        .delete(id)
        .await?;

    if !deleted {
        return Err(AppError::NotFound(format!("Webhook not found: {}", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Fire a single synthetic delivery to validate the endpoint. Bypasses the
/// retry state machine; the outcome is returned synchronously.
pub async fn test_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.auth.admin_token)?;

    let outcome = state.delivery_service.test_delivery(id).await?;

    Ok(Json(serde_json::json!({
        "success": outcome.is_success(),
        "response_status": outcome.response_status,
        "response_time_ms": outcome.response_time_ms,
        "error": outcome.error,
    })))
}
