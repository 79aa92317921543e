pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use config::Config;
use gateway::Gateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let gateway = Gateway::new(config.worker_id, config.outbound_buffer);
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
