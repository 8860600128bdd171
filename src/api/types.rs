use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DecisionRecord;
use crate::services::TraderStatus;

// ============================================================================
// System Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub trader: TraderStatus,
    pub uptime_seconds: i64,
    pub version: String,
    pub ledger_dir: String,
    pub replica: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub ok: bool,
    pub model: String,
    pub reference: String,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// Decision Types
// ============================================================================

pub const DEFAULT_RECENT_LIMIT: usize = 500;
pub const MAX_RECENT_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentResponse {
    pub records: Vec<DecisionRecord>,
    pub count: usize,
}
