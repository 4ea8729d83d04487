use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::delivery::{DeliveryAttempt, DeliveryRecord, DeliveryStatus};
use crate::domain::event::EventType;
use crate::utils::error::AppError;

const SELECT_COLUMNS: &str = "id, subscription_id, event, payload, url, method, request_headers, \
     status, response_status, response_body, error, attempts, \
     next_retry_at, delivered_at, created_at, updated_at";

/// Age after which a `pending` record is treated as orphaned and reclaimed.
/// Must exceed the maximum per-subscription dispatch timeout (300s) plus
/// persistence slack, so in-flight first attempts are never stolen.
const STALE_PENDING_SECS: i64 = 600;

/// Postgres-backed store for delivery records. The attempt log is embedded
/// as a JSONB array on each row.
#[derive(Clone)]
pub struct DeliveryRepository {
    pool: PgPool,
}

impl DeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, record: &DeliveryRecord) -> Result<(), AppError> {
        let attempts = serde_json::to_value(&record.attempts)
            .map_err(|e| AppError::Internal(format!("failed to serialize attempts: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (
                id, subscription_id, event, payload, url, method, request_headers,
                status, response_status, response_body, error, attempts,
                next_retry_at, delivered_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.subscription_id)
        .bind(record.event.as_str())
        .bind(&record.payload)
        .bind(&record.url)
        .bind(&record.method)
        .bind(&record.request_headers)
        .bind(record.status.as_str())
        .bind(record.response_status.map(|s| s as i32))
        .bind(&record.response_body)
        .bind(&record.error)
        .bind(attempts)
        .bind(record.next_retry_at)
        .bind(record.delivered_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the mutable part of a record after an attempt outcome. The
    /// attempt log is written together with the status so that a recorded
    /// attempt and the state it produced can never go out of sync.
    pub async fn update(&self, record: &DeliveryRecord) -> Result<(), AppError> {
        let attempts = serde_json::to_value(&record.attempts)
            .map_err(|e| AppError::Internal(format!("failed to serialize attempts: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $2, response_status = $3, response_body = $4, error = $5,
                attempts = $6, request_headers = $7, next_retry_at = $8,
                delivered_at = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(record.response_status.map(|s| s as i32))
        .bind(&record.response_body)
        .bind(&record.error)
        .bind(attempts)
        .bind(&record.request_headers)
        .bind(record.next_retry_at)
        .bind(record.delivered_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Delivery record not found: {}",
                record.id
            )));
        }
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DeliveryRecord>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhook_deliveries WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_delivery(&r)).transpose()
    }

    pub async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhook_deliveries WHERE subscription_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SELECT_COLUMNS
        ))
        .bind(subscription_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_delivery).collect()
    }

    /// Atomically claim due retries. The conditional UPDATE flips each due
    /// record back to `pending` only while it is still `retrying`, and
    /// `FOR UPDATE SKIP LOCKED` keeps two overlapping sweeps from claiming
    /// the same row.
    ///
    /// Also reclaims `pending` records untouched for longer than
    /// `STALE_PENDING_SECS`: a claimed record whose post-attempt update
    /// failed stays `pending` forever otherwise, since claims never select
    /// it again. The threshold exceeds the maximum dispatch timeout, so a
    /// record still in flight can never look stale.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let stale_cutoff = now - Duration::seconds(STALE_PENDING_SECS);

        let rows = sqlx::query(&format!(
            r#"
            UPDATE webhook_deliveries
            SET status = 'pending', next_retry_at = NULL, updated_at = NOW()
            WHERE id IN (
                SELECT id FROM webhook_deliveries
                WHERE (status = 'retrying' AND next_retry_at <= $1)
                   OR (status = 'pending' AND updated_at < $3)
                ORDER BY COALESCE(next_retry_at, updated_at)
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            AND status IN ('retrying', 'pending')
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .bind(stale_cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_delivery).collect()
    }

    /// Delete terminal records older than the cutoff. Returns the number of
    /// rows removed.
    pub async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM webhook_deliveries \
             WHERE status IN ('success', 'failed') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn map_delivery(row: &PgRow) -> Result<DeliveryRecord, AppError> {
    let id: Uuid = row.get("id");

    let event_name: String = row.get("event");
    let event = EventType::parse(&event_name).ok_or_else(|| {
        AppError::Internal(format!("unknown stored event for {}: {}", id, event_name))
    })?;

    let status_name: String = row.get("status");
    let status = DeliveryStatus::parse(&status_name).ok_or_else(|| {
        AppError::Internal(format!("unknown stored status for {}: {}", id, status_name))
    })?;

    let attempts_value: serde_json::Value = row.get("attempts");
    let attempts: Vec<DeliveryAttempt> = serde_json::from_value(attempts_value)
        .map_err(|e| AppError::Internal(format!("malformed attempt log for {}: {}", id, e)))?;

    let response_status: Option<i32> = row.get("response_status");

    Ok(DeliveryRecord {
        id,
        subscription_id: row.get("subscription_id"),
        event,
        payload: row.get("payload"),
        url: row.get("url"),
        method: row.get("method"),
        request_headers: row.get("request_headers"),
        status,
        response_status: response_status.map(|s| s as u16),
        response_body: row.get("response_body"),
        error: row.get("error"),
        attempts,
        next_retry_at: row.get("next_retry_at"),
        delivered_at: row.get("delivered_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
