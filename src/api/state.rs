use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::services::LiveTrader;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// The process's single live trader
    pub trader: Arc<LiveTrader>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(trader: Arc<LiveTrader>) -> Self {
        Self {
            trader,
            start_time: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
