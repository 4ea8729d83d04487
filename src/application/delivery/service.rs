//! Delivery orchestration: event fan-out, attempt/record cycle, retry sweep,
//! test deliveries and retention purge.
//!
//! The service owns the ordering guarantees: an attempt's outcome is
//! persisted before any further attempt for the same record can be issued,
//! and the sweep only dispatches records it has atomically claimed.

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::delivery::dispatcher::{DispatchOutcome, Dispatcher};
use crate::application::delivery::retry::{self, RetryDecision};
use crate::domain::delivery::DeliveryRecord;
use crate::domain::event::{EventEnvelope, EventType};
use crate::domain::subscription::Subscription;
use crate::infrastructure::repository::deliveries::DeliveryRepository;
use crate::infrastructure::repository::subscriptions::SubscriptionRepository;
use crate::utils::error::AppError;

/// Upper bound on records claimed per sweep batch.
const SWEEP_BATCH_SIZE: i64 = 100;

/// Requeue delay when a claimed record's subscription cannot be loaded.
/// Must be in the future, or the enclosing sweep loop would re-claim the
/// record in its next batch and spin on the same lookup failure.
const LOOKUP_FAILURE_BACKOFF_SECS: i64 = 60;

fn lookup_failure_retry_at(now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    now + Duration::seconds(LOOKUP_FAILURE_BACKOFF_SECS)
}

#[derive(Clone)]
pub struct DeliveryService {
    subscriptions: SubscriptionRepository,
    deliveries: DeliveryRepository,
    dispatcher: Dispatcher,
}

impl DeliveryService {
    pub fn new(
        subscriptions: SubscriptionRepository,
        deliveries: DeliveryRepository,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            subscriptions,
            deliveries,
            dispatcher,
        }
    }

    /// Fan an event out to every active subscription whose filter matches.
    /// Returns the number of matching subscriptions. Each subscription is
    /// delivered to independently; a failure for one does not affect the
    /// others.
    pub async fn notify(
        &self,
        event: EventType,
        data: serde_json::Value,
    ) -> Result<usize, AppError> {
        let subscriptions = self.subscriptions.find_active_by_event(event).await?;

        if subscriptions.is_empty() {
            return Ok(0);
        }

        info!(
            event = %event,
            subscription_count = subscriptions.len(),
            "Dispatching event to matching subscriptions"
        );

        let envelope = EventEnvelope::new(event, data);
        let payload = serde_json::to_value(&envelope)
            .map_err(|e| AppError::Internal(format!("failed to serialize envelope: {}", e)))?;

        let matched = subscriptions.len();
        for subscription in subscriptions {
            let mut record = DeliveryRecord::new(
                subscription.id,
                event,
                payload.clone(),
                subscription.url.clone(),
            );

            // The pending record is durable before the first attempt, so a
            // crash mid-dispatch leaves an inspectable trace.
            if let Err(e) = self.deliveries.create(&record).await {
                error!(
                    subscription_id = %subscription.id,
                    event = %event,
                    error = %e,
                    "Failed to create delivery record"
                );
                continue;
            }

            if let Err(e) = self.attempt(&mut record, &subscription).await {
                error!(
                    delivery_id = %record.id,
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to record delivery attempt"
                );
            }
        }

        Ok(matched)
    }

    /// Run one dispatch cycle for a record: call the endpoint, append the
    /// attempt, apply the retry decision and persist everything.
    ///
    /// An `Err` here means the outcome could not be persisted, which is a
    /// different failure from the HTTP call failing; the HTTP result itself
    /// is always captured in the attempt log.
    pub async fn attempt(
        &self,
        record: &mut DeliveryRecord,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec(&record.payload)
            .map_err(|e| AppError::Internal(format!("failed to serialize payload: {}", e)))?;

        let outcome = self
            .dispatcher
            .dispatch(subscription, record.event, record.id, &record.method, &body)
            .await;

        let success = outcome.is_success();
        record.request_headers = outcome.request_headers.clone();
        record.record_attempt(
            outcome.response_status,
            outcome.response_time_ms,
            outcome.error.clone(),
        );

        let attempts_made = record.attempts.len() as i32;
        match retry::decide(success, attempts_made, &subscription.retry_policy) {
            RetryDecision::Success => {
                let status = outcome.response_status.unwrap_or(200);
                record.mark_success(status, outcome.response_body.clone());
                info!(
                    delivery_id = %record.id,
                    subscription_id = %subscription.id,
                    event = %record.event,
                    response_status = status,
                    response_time_ms = outcome.response_time_ms,
                    attempt = attempts_made,
                    "Webhook delivered"
                );
            }
            RetryDecision::Retry { at } => {
                let message = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "delivery failed".to_string());
                record.mark_retrying(message.clone(), at);
                warn!(
                    delivery_id = %record.id,
                    subscription_id = %subscription.id,
                    event = %record.event,
                    error = %message,
                    attempt = attempts_made,
                    next_retry_at = %at,
                    "Webhook delivery failed, retry scheduled"
                );
            }
            RetryDecision::Exhausted => {
                let message = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "delivery failed".to_string());
                record.response_status = outcome.response_status;
                record.response_body = outcome.response_body.clone();
                record.mark_failed(message.clone());
                warn!(
                    delivery_id = %record.id,
                    subscription_id = %subscription.id,
                    event = %record.event,
                    error = %message,
                    attempt = attempts_made,
                    "Webhook delivery failed, retries exhausted"
                );
            }
        }

        // Persist the attempt and resulting state before anything else can
        // touch this record. Losing an attempt would corrupt the retry count.
        self.deliveries.update(record).await?;
        self.subscriptions
            .record_outcome(subscription.id, success)
            .await?;

        Ok(())
    }

    /// Claim and re-dispatch all due retries. Returns the number of records
    /// processed. Due work is rediscovered from storage each call; nothing
    /// is held in memory between sweeps.
    pub async fn sweep(&self) -> Result<u64, AppError> {
        let mut processed: u64 = 0;

        loop {
            let claimed = self.deliveries.claim_due(Utc::now(), SWEEP_BATCH_SIZE).await?;
            if claimed.is_empty() {
                break;
            }

            for mut record in claimed {
                processed += 1;

                match self.subscriptions.find_by_id(record.subscription_id).await {
                    Ok(Some(subscription)) if subscription.active => {
                        if let Err(e) = self.attempt(&mut record, &subscription).await {
                            error!(
                                delivery_id = %record.id,
                                error = %e,
                                "Failed to record retry attempt"
                            );
                        }
                    }
                    Ok(Some(_)) => {
                        self.abandon(&mut record, "subscription inactive").await;
                    }
                    Ok(None) => {
                        self.abandon(&mut record, "subscription deleted").await;
                    }
                    Err(e) => {
                        error!(
                            delivery_id = %record.id,
                            subscription_id = %record.subscription_id,
                            error = %e,
                            "Failed to load subscription for retry"
                        );
                        // Claim flipped the record to pending; push it back
                        // with a delay so a later sweep retries the lookup
                        // instead of this one re-claiming it immediately.
                        record.mark_retrying(
                            "subscription lookup failed".to_string(),
                            lookup_failure_retry_at(Utc::now()),
                        );
                        if let Err(e) = self.deliveries.update(&record).await {
                            error!(delivery_id = %record.id, error = %e, "Failed to reschedule record");
                        }
                    }
                }
            }
        }

        Ok(processed)
    }

    /// Terminal stop for a record whose subscription is gone or disabled.
    async fn abandon(&self, record: &mut DeliveryRecord, reason: &str) {
        info!(
            delivery_id = %record.id,
            subscription_id = %record.subscription_id,
            reason = %reason,
            "Abandoning delivery"
        );
        record.mark_failed(reason.to_string());
        if let Err(e) = self.deliveries.update(record).await {
            error!(delivery_id = %record.id, error = %e, "Failed to mark delivery abandoned");
        }
    }

    /// Single synthetic dispatch to validate endpoint reachability. Does not
    /// create a delivery record or enter the retry state machine; only the
    /// subscription's aggregate counters are updated.
    pub async fn test_delivery(&self, subscription_id: Uuid) -> Result<DispatchOutcome, AppError> {
        let subscription = self
            .subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Webhook not found: {}", subscription_id)))?;

        let event = subscription
            .events
            .first()
            .copied()
            .ok_or_else(|| AppError::InvalidInput("subscription has no events".to_string()))?;

        let envelope = EventEnvelope::new(event, serde_json::json!({ "test": true }));
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| AppError::Internal(format!("failed to serialize envelope: {}", e)))?;

        let outcome = self
            .dispatcher
            .dispatch(&subscription, event, Uuid::new_v4(), "POST", &body)
            .await;

        self.subscriptions
            .record_outcome(subscription.id, outcome.is_success())
            .await?;

        Ok(outcome)
    }

    /// Drop terminal records older than the retention window.
    pub async fn purge_expired(&self, retention_days: i64) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        self.deliveries.purge_expired(cutoff).await
    }

    pub fn delivery_repository(&self) -> &DeliveryRepository {
        &self.deliveries
    }

    pub fn subscription_repository(&self) -> &SubscriptionRepository {
        &self.subscriptions
    }
}
