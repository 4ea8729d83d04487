use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::domain::event::EventType;
use crate::domain::subscription::{RetryPolicy, Subscription};
use crate::utils::error::AppError;

const SELECT_COLUMNS: &str = "id, created_by, name, url, secret, events, active, headers, \
     max_retries, retry_delay_ms, backoff_multiplier, timeout_ms, \
     total_deliveries, successful_deliveries, failed_deliveries, \
     last_triggered_at, created_at, updated_at";

/// Postgres-backed store for webhook subscriptions.
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, sub: &Subscription) -> Result<(), AppError> {
        let events: Vec<String> = sub.events.iter().map(|e| e.as_str().to_string()).collect();
        let headers = serde_json::to_value(&sub.headers)
            .map_err(|e| AppError::Internal(format!("failed to serialize headers: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions (
                id, created_by, name, url, secret, events, active, headers,
                max_retries, retry_delay_ms, backoff_multiplier, timeout_ms,
                total_deliveries, successful_deliveries, failed_deliveries,
                last_triggered_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(sub.id)
        .bind(sub.created_by)
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(&sub.secret)
        .bind(&events)
        .bind(sub.active)
        .bind(headers)
        .bind(sub.retry_policy.max_retries)
        .bind(sub.retry_policy.retry_delay_ms)
        .bind(sub.retry_policy.backoff_multiplier)
        .bind(sub.timeout_ms)
        .bind(sub.total_deliveries)
        .bind(sub.successful_deliveries)
        .bind(sub.failed_deliveries)
        .bind(sub.last_triggered_at)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhook_subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_subscription(&r)).transpose()
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Subscription>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhook_subscriptions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_subscription).collect()
    }

    /// Registry lookup: active subscriptions whose event filter contains the
    /// event. No ordering guarantee.
    pub async fn find_active_by_event(
        &self,
        event: EventType,
    ) -> Result<Vec<Subscription>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhook_subscriptions WHERE active = TRUE AND $1 = ANY(events)",
            SELECT_COLUMNS
        ))
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_subscription).collect()
    }

    pub async fn update(&self, sub: &Subscription) -> Result<(), AppError> {
        let events: Vec<String> = sub.events.iter().map(|e| e.as_str().to_string()).collect();
        let headers = serde_json::to_value(&sub.headers)
            .map_err(|e| AppError::Internal(format!("failed to serialize headers: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET name = $2, url = $3, secret = $4, events = $5, active = $6,
                headers = $7, max_retries = $8, retry_delay_ms = $9,
                backoff_multiplier = $10, timeout_ms = $11, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sub.id)
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(&sub.secret)
        .bind(&events)
        .bind(sub.active)
        .bind(headers)
        .bind(sub.retry_policy.max_retries)
        .bind(sub.retry_policy.retry_delay_ms)
        .bind(sub.retry_policy.backoff_multiplier)
        .bind(sub.timeout_ms)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Webhook not found: {}", sub.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the aggregate outcome of one dispatch. A single UPDATE keeps
    /// the counter increments atomic under concurrent deliveries.
    pub async fn record_outcome(&self, id: Uuid, success: bool) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET total_deliveries = total_deliveries + 1,
                successful_deliveries = successful_deliveries + CASE WHEN $2 THEN 1 ELSE 0 END,
                failed_deliveries = failed_deliveries + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_triggered_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_subscription(row: &PgRow) -> Result<Subscription, AppError> {
    let id: Uuid = row.get("id");
    let event_names: Vec<String> = row.get("events");
    let events = event_names
        .iter()
        .filter_map(|name| {
            let parsed = EventType::parse(name);
            if parsed.is_none() {
                // Stored names are validated on write, so this means the row
                // was edited out of band.
                warn!(subscription_id = %id, event = %name, "Ignoring unknown stored event name");
            }
            parsed
        })
        .collect();

    let headers_value: serde_json::Value = row.get("headers");
    let headers: HashMap<String, String> = serde_json::from_value(headers_value)
        .map_err(|e| AppError::Internal(format!("malformed headers for {}: {}", id, e)))?;

    let last_triggered_at: Option<DateTime<Utc>> = row.get("last_triggered_at");

    Ok(Subscription {
        id,
        created_by: row.get("created_by"),
        name: row.get("name"),
        url: row.get("url"),
        secret: row.get("secret"),
        events,
        active: row.get("active"),
        headers,
        retry_policy: RetryPolicy {
            max_retries: row.get("max_retries"),
            retry_delay_ms: row.get("retry_delay_ms"),
            backoff_multiplier: row.get("backoff_multiplier"),
        },
        timeout_ms: row.get("timeout_ms"),
        total_deliveries: row.get("total_deliveries"),
        successful_deliveries: row.get("successful_deliveries"),
        failed_deliveries: row.get("failed_deliveries"),
        last_triggered_at,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
