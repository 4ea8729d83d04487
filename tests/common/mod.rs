//! Shared fixtures for delivery integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use uuid::Uuid;

use helpdesk_webhooks::domain::event::EventType;
use helpdesk_webhooks::domain::subscription::{RetryPolicy, Subscription};

pub const TEST_SECRET: &str = "test-secret-0123456789";

/// A valid subscription pointing at the given endpoint URL.
pub fn subscription(url: &str) -> Subscription {
    let mut sub = Subscription::new(
        Uuid::new_v4(),
        "test endpoint".to_string(),
        url.to_string(),
        TEST_SECRET.to_string(),
        vec![EventType::TicketCreated, EventType::TicketClosed],
    );
    sub.timeout_ms = 5_000;
    sub
}

pub fn subscription_with_policy(url: &str, policy: RetryPolicy) -> Subscription {
    let mut sub = subscription(url);
    sub.retry_policy = policy;
    sub
}
