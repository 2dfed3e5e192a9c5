pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;

pub use error::CoreError;

use std::sync::Arc;
use std::time::Duration;

// Shared state handed to the request layer; services take the db handle
// per call.
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let db = database::Database::new(
            &config.database.url,
            config.database.pool_size,
            Duration::from_millis(config.database.busy_timeout_ms),
        )
        .await?;

        db.run_migrations().await?;

        Ok(Arc::new(Self { db, config }))
    }
}
