use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::api::{handlers, health};
use crate::application::delivery::service::DeliveryService;
use crate::config::settings::Auth;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub delivery_service: DeliveryService,
    pub auth: Auth,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Webhook subscription routes
        .route("/api/webhooks", get(handlers::subscriptions::list_webhooks))
        .route("/api/webhooks", post(handlers::subscriptions::create_webhook))
        .route("/api/webhooks/{id}", get(handlers::subscriptions::get_webhook))
        .route("/api/webhooks/{id}", put(handlers::subscriptions::update_webhook))
        .route("/api/webhooks/{id}", delete(handlers::subscriptions::delete_webhook))
        .route("/api/webhooks/{id}/test", post(handlers::subscriptions::test_webhook))
        .route(
            "/api/webhooks/{id}/deliveries",
            get(handlers::deliveries::list_deliveries),
        )
        // Delivery record routes
        .route("/api/deliveries/sweep", post(handlers::deliveries::trigger_sweep))
        .route("/api/deliveries/{id}", get(handlers::deliveries::get_delivery))
        // Event intake
        .route("/api/events", post(handlers::events::ingest_event))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
