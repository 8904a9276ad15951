//! # Web API Application State
//!
//! Shared state handed to every request handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::DatastoreConfig;

/// Shared application state for the web API
///
/// Cloned per request; the pool and configuration are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<DatastoreConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: DatastoreConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool_size", &self.pool.size())
            .field("bind_address", &self.config.web.bind_address)
            .finish()
    }
}
