use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::engine::RecommendationEngine;
use crate::store::ContentStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub store: Arc<dyn ContentStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates the serving state around a store; the engine starts untrained
    /// and serves the popularity fallback until the first rebuild completes.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            engine: Arc::new(RecommendationEngine::new(store.clone())),
            store,
            started_at: Utc::now(),
        }
    }
}
