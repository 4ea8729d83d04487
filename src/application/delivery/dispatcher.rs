//! Outbound HTTP dispatch for webhook deliveries.
//!
//! A dispatch is one bounded HTTP call: build the signed request, send it
//! with the subscription's timeout, and capture status, body and latency.
//! Persistence of the attempt happens in the delivery service so that a
//! storage failure is never mistaken for an endpoint failure.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::warn;
use uuid::Uuid;

use crate::application::delivery::signer;
use crate::domain::event::EventType;
use crate::domain::subscription::Subscription;

/// Maximum stored response body length; longer bodies are truncated.
const MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// Outcome of a single dispatch, successful or not.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub response_time_ms: i64,
    pub error: Option<String>,
    /// The headers that went out on the wire, for record diagnostics.
    pub request_headers: serde_json::Value,
}

impl DispatchOutcome {
    /// A delivery counts as successful only for 2xx responses.
    pub fn is_success(&self) -> bool {
        matches!(self.response_status, Some(code) if (200..300).contains(&code))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    http_client: Client,
}

impl Dispatcher {
    /// Build a dispatcher with a shared HTTP client. Timeouts are applied
    /// per request from each subscription's configuration.
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http_client })
    }

    /// Execute one delivery attempt against the subscription's endpoint.
    pub async fn dispatch(
        &self,
        subscription: &Subscription,
        event: EventType,
        delivery_id: Uuid,
        method: &str,
        body: &[u8],
    ) -> DispatchOutcome {
        let headers = self.build_headers(subscription, event, delivery_id, body);
        let request_headers = headers_to_json(&headers);
        let method = Method::from_bytes(method.as_bytes()).unwrap_or(Method::POST);
        let timeout = Duration::from_millis(subscription.timeout_ms as u64);

        let start = Instant::now();
        let result = self
            .http_client
            .request(method, &subscription.url)
            .headers(headers)
            .timeout(timeout)
            .body(body.to_vec())
            .send()
            .await;
        let response_time_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let response_body = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_RESPONSE_BODY_CHARS)
                    .collect::<String>();

                let error = if (200..300).contains(&status) {
                    None
                } else {
                    Some(format!("HTTP {}", status))
                };

                DispatchOutcome {
                    response_status: Some(status),
                    response_body: Some(response_body),
                    response_time_ms,
                    error,
                    request_headers,
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("request timed out after {}ms", subscription.timeout_ms)
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request error: {}", e)
                };

                DispatchOutcome {
                    response_status: None,
                    response_body: None,
                    response_time_ms,
                    error: Some(error),
                    request_headers,
                }
            }
        }
    }

    /// Custom subscription headers plus content type, signature and event
    /// metadata. Unparseable custom headers are skipped, not fatal.
    fn build_headers(
        &self,
        subscription: &Subscription,
        event: EventType,
        delivery_id: Uuid,
        body: &[u8],
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in &subscription.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(n), Ok(v)) => {
                    headers.insert(n, v);
                }
                _ => {
                    warn!(
                        subscription_id = %subscription.id,
                        header = %name,
                        "Skipping invalid custom header"
                    );
                }
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(v) = HeaderValue::from_str(&signer::signature_header_value(&subscription.secret, body)) {
            headers.insert(HeaderName::from_static(signer::SIGNATURE_HEADER), v);
        }
        if let Ok(v) = HeaderValue::from_str(event.as_str()) {
            headers.insert(HeaderName::from_static("x-webhook-event"), v);
        }
        if let Ok(v) = HeaderValue::from_str(&delivery_id.to_string()) {
            headers.insert(HeaderName::from_static("x-webhook-delivery"), v);
        }

        headers
    }
}

fn headers_to_json(headers: &HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.to_string(), serde_json::Value::String(v.to_string()));
        }
    }
    serde_json::Value::Object(map)
}
