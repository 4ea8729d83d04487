use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::event::EventType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Retrying,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "retrying" => Some(DeliveryStatus::Retrying),
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP call execution within a delivery's history. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_number: i32,
    pub timestamp: DateTime<Utc>,
    pub response_status: Option<u16>,
    pub response_time_ms: i64,
    pub error: Option<String>,
}

/// Durable record of one event's delivery lifecycle to one subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event: EventType,
    pub payload: serde_json::Value,
    pub url: String,
    pub method: String,
    pub request_headers: serde_json::Value,
    pub status: DeliveryStatus,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub attempts: Vec<DeliveryAttempt>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(
        subscription_id: Uuid,
        event: EventType,
        payload: serde_json::Value,
        url: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            event,
            payload,
            url,
            method: "POST".to_string(),
            request_headers: serde_json::json!({}),
            status: DeliveryStatus::Pending,
            response_status: None,
            response_body: None,
            error: None,
            attempts: Vec::new(),
            next_retry_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append the outcome of one HTTP call. Attempt numbers are 1-based and
    /// strictly increasing.
    pub fn record_attempt(
        &mut self,
        response_status: Option<u16>,
        response_time_ms: i64,
        error: Option<String>,
    ) {
        let attempt = DeliveryAttempt {
            attempt_number: self.attempts.len() as i32 + 1,
            timestamp: Utc::now(),
            response_status,
            response_time_ms,
            error,
        };
        self.attempts.push(attempt);
        self.updated_at = Utc::now();
    }

    pub fn mark_success(&mut self, response_status: u16, response_body: Option<String>) {
        let now = Utc::now();
        self.status = DeliveryStatus::Success;
        self.response_status = Some(response_status);
        self.response_body = response_body;
        self.error = None;
        self.next_retry_at = None;
        self.delivered_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_retrying(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.status = DeliveryStatus::Retrying;
        self.error = Some(error);
        self.next_retry_at = Some(next_retry_at);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = DeliveryStatus::Failed;
        self.error = Some(error);
        self.next_retry_at = None;
        self.updated_at = Utc::now();
    }

    pub fn last_attempt(&self) -> Option<&DeliveryAttempt> {
        self.attempts.last()
    }
}
