use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NOTE: &str = "paper-trade";

/// One live trading decision as written to the ledger.
///
/// Records are immutable once appended. A correction is a new record, never
/// an edit of an old line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Decision time in seconds since the Unix epoch
    pub timestamp: i64,
    /// RFC3339 rendering of `timestamp` in UTC
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub interval: String,
    pub price: f64,
    /// Clamped policy output
    pub action: f64,
    /// Position after the step
    pub position: f64,
    pub equity: f64,
    #[serde(default)]
    pub trade_count: u64,
    /// Artifact the policy was loaded from
    #[serde(default)]
    pub model_reference: Option<String>,
    #[serde(default = "default_note")]
    pub note: String,
}

fn default_note() -> String {
    DEFAULT_NOTE.to_string()
}

impl DecisionRecord {
    /// Start of the minute this decision belongs to
    pub fn minute_bucket(&self) -> i64 {
        minute_bucket(self.timestamp)
    }

    /// UTC calendar day partition key (`YYYYMMDD`)
    pub fn partition_key(&self) -> String {
        partition_key(self.timestamp)
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

/// Floor a timestamp in seconds to the start of its minute.
pub fn minute_bucket(timestamp_secs: i64) -> i64 {
    timestamp_secs.div_euclid(60) * 60
}

/// UTC day key for a timestamp in seconds.
pub fn partition_key(timestamp_secs: i64) -> String {
    Utc.timestamp_opt(timestamp_secs, 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
        .format("%Y%m%d")
        .to_string()
}

/// RFC3339 rendering used for the `datetime` field.
pub fn render_datetime(timestamp_secs: i64) -> String {
    Utc.timestamp_opt(timestamp_secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
