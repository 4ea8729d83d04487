use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::application::delivery::service::DeliveryService;
use crate::config::settings::Sweeper as SweeperConfig;

/// Periodic retry sweep. Each cycle rediscovers due records from storage,
/// re-dispatches them and purges expired terminal records; there is no
/// in-memory backlog to lose across restarts.
pub struct Sweeper {
    service: DeliveryService,
    config: SweeperConfig,
    running: bool,
}

impl Sweeper {
    pub fn new(service: DeliveryService, config: SweeperConfig) -> Self {
        Self {
            service,
            config,
            running: false,
        }
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("Retry sweeper is disabled");
            return Ok(());
        }

        if self.running {
            return Ok(());
        }

        self.running = true;
        info!(
            interval_secs = self.config.interval_secs,
            "Starting retry sweeper"
        );

        while self.running {
            match self.service.sweep().await {
                Ok(0) => {}
                Ok(processed) => {
                    info!(processed, "Retry sweep completed");
                }
                Err(e) => {
                    error!(error = %e, "Retry sweep failed");
                }
            }

            match self.service.purge_expired(self.config.retention_days).await {
                Ok(0) => {}
                Ok(purged) => {
                    info!(purged, "Purged expired delivery records");
                }
                Err(e) => {
                    error!(error = %e, "Retention purge failed");
                }
            }

            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }

        info!("Retry sweeper stopped");
        Ok(())
    }

    pub fn stop(&mut self) {
        info!("Stopping retry sweeper");
        self.running = false;
    }
}
