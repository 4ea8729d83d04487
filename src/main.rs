use tokio::signal;
use tracing::{error, info};

use helpdesk_webhooks::api::routes::{self, AppState};
use helpdesk_webhooks::application::delivery::dispatcher::Dispatcher;
use helpdesk_webhooks::application::delivery::service::DeliveryService;
use helpdesk_webhooks::application::delivery::sweeper::Sweeper;
use helpdesk_webhooks::config::settings::AppConfig;
use helpdesk_webhooks::infrastructure::repository::deliveries::DeliveryRepository;
use helpdesk_webhooks::infrastructure::repository::subscriptions::SubscriptionRepository;
use helpdesk_webhooks::utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init_tracing();

    info!("Starting helpdesk webhook delivery service");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded");

    // Initialize database connection
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    info!("Database connection established");

    // Wire the delivery pipeline
    let dispatcher = Dispatcher::new(&config.delivery.user_agent)?;
    let delivery_service = DeliveryService::new(
        SubscriptionRepository::new(db_pool.clone()),
        DeliveryRepository::new(db_pool.clone()),
        dispatcher,
    );
    info!("Delivery service initialized");

    // Start the API server
    let state = AppState {
        db_pool,
        delivery_service: delivery_service.clone(),
        auth: config.auth.clone(),
    };
    let api_handle = tokio::spawn(routes::serve(config.server.port, state));
    info!("API server started on port {}", config.server.port);

    // Start the retry sweeper
    let sweeper_config = config.sweeper.clone();
    let sweeper_handle = tokio::spawn(async move {
        let mut sweeper = Sweeper::new(delivery_service, sweeper_config);
        if let Err(e) = sweeper.start().await {
            error!("Sweeper error: {}", e);
        }
    });
    info!("Retry sweeper started");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping services");

            api_handle.abort();
            sweeper_handle.abort();

            info!("All services stopped");
        }
        Err(err) => {
            error!("Error waiting for shutdown signal: {}", err);
        }
    }

    Ok(())
}
