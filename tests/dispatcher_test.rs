//! Wire-level tests for the outbound dispatcher: response classification,
//! signing headers, timeouts and connection failures.

mod common;

use common::{subscription, TEST_SECRET};
use helpdesk_webhooks::application::delivery::dispatcher::Dispatcher;
use helpdesk_webhooks::application::delivery::signer;
use helpdesk_webhooks::domain::event::EventType;
use uuid::Uuid;

fn dispatcher() -> Dispatcher {
    Dispatcher::new("helpdesk-webhooks-test/0.1").expect("client builds")
}

#[tokio::test]
async fn test_2xx_response_is_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let sub = subscription(&format!("{}/hook", server.url()));
    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    mock.assert_async().await;
    assert!(outcome.is_success());
    assert_eq!(outcome.response_status, Some(200));
    assert_eq!(outcome.response_body.as_deref(), Some("ok"));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_500_response_is_failure_with_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .create_async()
        .await;

    let sub = subscription(&format!("{}/hook", server.url()));
    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    mock.assert_async().await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.response_status, Some(500));
    assert_eq!(outcome.error.as_deref(), Some("HTTP 500"));
}

#[tokio::test]
async fn test_redirect_is_not_success() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(302)
        .with_header("location", "https://elsewhere.example.com")
        .create_async()
        .await;

    let sub = subscription(&format!("{}/hook", server.url()));
    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    // Redirects are not followed; a 3xx counts as a delivery failure.
    assert!(!outcome.is_success());
    assert_eq!(outcome.response_status, Some(302));
}

#[tokio::test]
async fn test_request_carries_signature_and_metadata_headers() {
    let body = br#"{"event":"ticket.created","data":{"id":7}}"#;
    let expected_signature = signer::signature_header_value(TEST_SECRET, body);
    let delivery_id = Uuid::new_v4();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_header(signer::SIGNATURE_HEADER, expected_signature.as_str())
        .match_header("x-webhook-event", "ticket.created")
        .match_header("x-webhook-delivery", delivery_id.to_string().as_str())
        .with_status(204)
        .create_async()
        .await;

    let sub = subscription(&format!("{}/hook", server.url()));
    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, delivery_id, "POST", body)
        .await;

    mock.assert_async().await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_request_carries_custom_subscription_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("x-tenant", "acme")
        .with_status(200)
        .create_async()
        .await;

    let mut sub = subscription(&format!("{}/hook", server.url()));
    sub.headers.insert("X-Tenant".to_string(), "acme".to_string());

    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    mock.assert_async().await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_unresponsive_endpoint_times_out() {
    // A listener that accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        }
    });

    let mut sub = subscription(&format!("http://{}/hook", addr));
    sub.timeout_ms = 1_000;

    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    hold.abort();

    assert!(!outcome.is_success());
    assert_eq!(outcome.response_status, None);
    let error = outcome.error.expect("timeout error recorded");
    assert!(error.contains("timed out"), "unexpected error: {}", error);
    // Elapsed time should be about the configured timeout.
    assert!(
        (900..3_000).contains(&outcome.response_time_ms),
        "unexpected elapsed: {}ms",
        outcome.response_time_ms
    );
}

#[tokio::test]
async fn test_connection_refused_is_failure_without_status() {
    // Bind and immediately drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let sub = subscription(&format!("http://{}/hook", addr));
    let outcome = dispatcher()
        .dispatch(&sub, EventType::TicketCreated, Uuid::new_v4(), "POST", b"{}")
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.response_status, None);
    assert!(outcome.error.is_some());
}
