use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::event::EventType;
use crate::utils::error::AppError;

pub const MIN_SECRET_LEN: usize = 16;
pub const MIN_RETRY_DELAY_MS: i64 = 100;
pub const MIN_TIMEOUT_MS: i64 = 1_000;
pub const MAX_TIMEOUT_MS: i64 = 300_000;

/// Per-subscription retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub retry_delay_ms: i64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_retries < 0 {
            return Err(AppError::InvalidInput(
                "max_retries must not be negative".to_string(),
            ));
        }
        if self.retry_delay_ms < MIN_RETRY_DELAY_MS {
            return Err(AppError::InvalidInput(format!(
                "retry_delay_ms must be at least {}",
                MIN_RETRY_DELAY_MS
            )));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(AppError::InvalidInput(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A registered webhook endpoint with its event filter and retry policy.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub url: String,
    /// Shared signing secret; never serialized into API responses.
    #[serde(skip_serializing)]
    pub secret: String,
    pub events: Vec<EventType>,
    pub active: bool,
    pub headers: HashMap<String, String>,
    pub retry_policy: RetryPolicy,
    pub timeout_ms: i64,
    pub total_deliveries: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(created_by: Uuid, name: String, url: String, secret: String, events: Vec<EventType>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_by,
            name,
            url,
            secret,
            events,
            active: true,
            headers: HashMap::new(),
            retry_policy: RetryPolicy::default(),
            timeout_ms: 30_000,
            total_deliveries: 0,
            successful_deliveries: 0,
            failed_deliveries: 0,
            last_triggered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_subscribed_to(&self, event: EventType) -> bool {
        self.events.contains(&event)
    }

    /// Fraction of deliveries that succeeded; 0 when nothing was delivered yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_deliveries == 0 {
            0.0
        } else {
            self.successful_deliveries as f64 / self.total_deliveries as f64
        }
    }

    /// Validate all creation-time constraints. Anything rejected here never
    /// reaches the delivery path.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_endpoint_url(&self.url)?;
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(AppError::InvalidInput(format!(
                "secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        if self.events.is_empty() {
            return Err(AppError::InvalidInput(
                "events must not be empty".to_string(),
            ));
        }
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(AppError::InvalidInput(format!(
                "timeout_ms must be between {} and {}",
                MIN_TIMEOUT_MS, MAX_TIMEOUT_MS
            )));
        }
        self.retry_policy.validate()
    }
}

/// Check that a delivery URL is an absolute http(s) URL with a host.
pub fn validate_endpoint_url(raw: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::InvalidInput(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidInput(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::InvalidInput("URL must have a host".to_string()));
    }

    Ok(())
}
