//! Retry decision logic for delivery records.
//!
//! Pure state machine: given the outcome of one attempt, the attempt count so
//! far and the subscription's retry policy, decide the record's next state.
//! A record makes at most `max_retries + 1` attempts in total.

use chrono::{DateTime, Duration, Utc};

use crate::domain::subscription::RetryPolicy;

/// Next state for a delivery record after an attempt outcome is recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Attempt got a 2xx response. Terminal.
    Success,
    /// Attempt failed and retries remain; dispatch again at the given time.
    Retry { at: DateTime<Utc> },
    /// Attempt failed and retries are exhausted. Terminal.
    Exhausted,
}

/// Decide what happens after attempt number `attempts_made` (1-based count of
/// attempts recorded so far, including the one just made).
pub fn decide(success: bool, attempts_made: i32, policy: &RetryPolicy) -> RetryDecision {
    decide_at(success, attempts_made, policy, Utc::now())
}

/// As `decide`, with an explicit clock for testing.
pub fn decide_at(
    success: bool,
    attempts_made: i32,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> RetryDecision {
    if success {
        return RetryDecision::Success;
    }
    if attempts_made > policy.max_retries {
        return RetryDecision::Exhausted;
    }
    RetryDecision::Retry {
        at: now + backoff_delay(attempts_made, policy),
    }
}

/// Delay before the retry that follows attempt `attempts_made`:
/// `retry_delay × backoff_multiplier^(attempts_made − 1)`.
pub fn backoff_delay(attempts_made: i32, policy: &RetryPolicy) -> Duration {
    let exponent = (attempts_made - 1).max(0);
    let factor = policy.backoff_multiplier.powi(exponent);
    let millis = (policy.retry_delay_ms as f64 * factor).round();
    // Clamp to keep pathological multipliers from overflowing chrono.
    let millis = millis.min(i64::MAX as f64 / 2.0) as i64;
    Duration::milliseconds(millis)
}
