use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            app: AppConfig {
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "ticket_core=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://ticket_core.db".to_string()),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
                busy_timeout_ms: env::var("DB_BUSY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("DB_BUSY_TIMEOUT_MS must be a valid number"),
            },
        }
    }
}
