// src/state.rs
use std::sync::Arc;

use crate::services::rate_limit::RateLimiter;
use crate::services::store::DocumentStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: DocumentStore,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            store: DocumentStore::new(),
            limiter: RateLimiter::per_minute(rate_limit_per_minute),
        }
    }
}
