use std::sync::Arc;

use resume_guard::{MemoryStore, RateLimiter};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub limiter: Arc<RateLimiter>,
    /// Backing store of `limiter`, kept for the expiry sweep.
    pub store: Arc<MemoryStore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(Arc::new(config.rate_limit.clone()), store.clone());
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            store,
        }
    }
}
