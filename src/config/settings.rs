use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    /// Bearer token for the administrative API surface.
    pub admin_token: String,
    /// Separate bearer token for the sweep trigger endpoint.
    pub sweep_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Delivery {
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Sweeper {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: Database,
    pub server: Server,
    pub auth: Auth,
    pub delivery: Delivery,
    pub sweeper: Sweeper,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".into());

        let s = Config::builder()
            // Start with default settings
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add mode-specific settings
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local settings
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables with prefix "APP_"
            .add_source(Environment::with_prefix("APP").separator("_"))
            .build()?;

        s.try_deserialize()
    }
}
