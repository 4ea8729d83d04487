//! End-to-end retry behavior: attempt counts, backoff spacing and terminal
//! states, exercised through the dispatcher against mock endpoints with the
//! same decision logic the delivery service applies.

mod common;

use chrono::Utc;
use common::subscription_with_policy;
use helpdesk_webhooks::application::delivery::dispatcher::Dispatcher;
use helpdesk_webhooks::application::delivery::retry::{self, RetryDecision};
use helpdesk_webhooks::domain::delivery::{DeliveryRecord, DeliveryStatus};
use helpdesk_webhooks::domain::event::EventType;
use helpdesk_webhooks::domain::subscription::{RetryPolicy, Subscription};
use uuid::Uuid;

fn policy(max_retries: i32, retry_delay_ms: i64, backoff_multiplier: f64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay_ms,
        backoff_multiplier,
    }
}

/// Drive one record to a terminal state: dispatch, append the attempt, apply
/// the retry decision. Returns the scheduled retry delays in milliseconds.
async fn run_to_terminal(
    dispatcher: &Dispatcher,
    sub: &Subscription,
    record: &mut DeliveryRecord,
) -> Vec<i64> {
    let body = serde_json::to_vec(&record.payload).unwrap();
    let mut delays = Vec::new();

    loop {
        let outcome = dispatcher
            .dispatch(sub, record.event, record.id, &record.method, &body)
            .await;
        let success = outcome.is_success();
        record.record_attempt(
            outcome.response_status,
            outcome.response_time_ms,
            outcome.error.clone(),
        );

        let now = Utc::now();
        match retry::decide_at(success, record.attempts.len() as i32, &sub.retry_policy, now) {
            RetryDecision::Success => {
                record.mark_success(outcome.response_status.unwrap_or(200), None);
                return delays;
            }
            RetryDecision::Retry { at } => {
                delays.push((at - now).num_milliseconds());
                record.mark_retrying("failed".to_string(), at);
                // The sweep granularity is compressed to zero here; the
                // schedule itself is what's under test.
            }
            RetryDecision::Exhausted => {
                record.mark_failed(
                    outcome.error.unwrap_or_else(|| "failed".to_string()),
                );
                return delays;
            }
        }
    }
}

fn new_record(sub: &Subscription) -> DeliveryRecord {
    DeliveryRecord::new(
        sub.id,
        EventType::TicketCreated,
        serde_json::json!({"event": "ticket.created", "data": {"id": 1}}),
        sub.url.clone(),
    )
}

#[tokio::test]
async fn test_continuously_failing_endpoint_makes_max_retries_plus_one_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let sub = subscription_with_policy(&format!("{}/hook", server.url()), policy(2, 1000, 2.0));
    let dispatcher = Dispatcher::new("test").unwrap();
    let mut record = new_record(&sub);

    run_to_terminal(&dispatcher, &sub, &mut record).await;

    mock.assert_async().await;
    assert_eq!(record.attempts.len(), 3);
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert!(record.delivered_at.is_none());
    assert!(record.next_retry_at.is_none());
}

#[tokio::test]
async fn test_success_on_third_attempt_after_two_failures() {
    let mut server = mockito::Server::new_async().await;
    let fail = server
        .mock("POST", "/hook")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let sub = subscription_with_policy(&format!("{}/hook", server.url()), policy(2, 1000, 2.0));
    let dispatcher = Dispatcher::new("test").unwrap();
    let mut record = new_record(&sub);
    let body = serde_json::to_vec(&record.payload).unwrap();

    // First two attempts fail; capture the scheduled backoff delays.
    let mut delays = Vec::new();
    for _ in 0..2 {
        let outcome = dispatcher
            .dispatch(&sub, record.event, record.id, &record.method, &body)
            .await;
        assert!(!outcome.is_success());
        record.record_attempt(outcome.response_status, outcome.response_time_ms, outcome.error);

        let now = Utc::now();
        match retry::decide_at(false, record.attempts.len() as i32, &sub.retry_policy, now) {
            RetryDecision::Retry { at } => {
                delays.push((at - now).num_milliseconds());
                record.mark_retrying("HTTP 500".to_string(), at);
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }
    fail.assert_async().await;

    // Endpoint recovers: a newer mock takes precedence over the failing one.
    let succeed = server
        .mock("POST", "/hook")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let outcome = dispatcher
        .dispatch(&sub, record.event, record.id, &record.method, &body)
        .await;
    assert!(outcome.is_success());
    record.record_attempt(outcome.response_status, outcome.response_time_ms, None);
    match retry::decide(true, record.attempts.len() as i32, &sub.retry_policy) {
        RetryDecision::Success => record.mark_success(200, None),
        other => panic!("expected success, got {:?}", other),
    }
    succeed.assert_async().await;

    assert_eq!(record.attempts.len(), 3);
    assert_eq!(record.status, DeliveryStatus::Success);
    assert!(record.delivered_at.is_some());

    // Backoff schedule: 1000ms after the first failure, 2000ms after the
    // second (retry_delay × multiplier^(attempt − 1)).
    assert_eq!(delays, vec![1000, 2000]);
}

#[tokio::test]
async fn test_zero_max_retries_fails_after_single_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let sub = subscription_with_policy(&format!("{}/hook", server.url()), policy(0, 1000, 2.0));
    let dispatcher = Dispatcher::new("test").unwrap();
    let mut record = new_record(&sub);

    let delays = run_to_terminal(&dispatcher, &sub, &mut record).await;

    mock.assert_async().await;
    assert!(delays.is_empty(), "no retry may be scheduled");
    assert_eq!(record.attempts.len(), 1);
    assert_eq!(record.status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn test_immediate_success_makes_exactly_one_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let sub = subscription_with_policy(&format!("{}/hook", server.url()), policy(3, 1000, 2.0));
    let dispatcher = Dispatcher::new("test").unwrap();
    let mut record = new_record(&sub);

    run_to_terminal(&dispatcher, &sub, &mut record).await;

    mock.assert_async().await;
    assert_eq!(record.attempts.len(), 1);
    assert_eq!(record.status, DeliveryStatus::Success);
    assert_eq!(record.response_status, Some(201));
    assert!(record.delivered_at.is_some());
}

#[tokio::test]
async fn test_attempt_log_records_failure_details() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let sub = subscription_with_policy(&format!("{}/hook", server.url()), policy(0, 1000, 2.0));
    let dispatcher = Dispatcher::new("test").unwrap();
    let mut record = new_record(&sub);

    run_to_terminal(&dispatcher, &sub, &mut record).await;

    let attempt = record.last_attempt().expect("attempt recorded");
    assert_eq!(attempt.attempt_number, 1);
    assert_eq!(attempt.response_status, Some(500));
    assert_eq!(attempt.error.as_deref(), Some("HTTP 500"));
    assert_eq!(record.error.as_deref(), Some("HTTP 500"));
}
