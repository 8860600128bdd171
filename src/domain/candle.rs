use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraderError};

/// A single OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Open time as a UTC datetime
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Open time truncated to whole seconds
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp.div_euclid(1000)
    }

    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Check that a series is non-empty, finite, and strictly increasing in time.
pub fn validate_series(candles: &[Candle]) -> Result<()> {
    if candles.is_empty() {
        return Err(TraderError::Data("candle series is empty".to_string()));
    }

    for (idx, candle) in candles.iter().enumerate() {
        if !candle.is_finite() {
            return Err(TraderError::Data(format!(
                "candle {idx} (ts={}) has non-finite values",
                candle.timestamp
            )));
        }
        if candle.volume < 0.0 {
            return Err(TraderError::Data(format!(
                "candle {idx} (ts={}) has negative volume {}",
                candle.timestamp, candle.volume
            )));
        }
    }

    if let Some(pair) = candles.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        return Err(TraderError::Data(format!(
            "candle timestamps must be strictly increasing: {} followed by {}",
            pair[0].timestamp, pair[1].timestamp
        )));
    }

    Ok(())
}

/// Sort by timestamp and reject duplicate timestamps.
pub fn sort_and_dedup_check(candles: &mut [Candle]) -> Result<()> {
    candles.sort_by_key(|c| c.timestamp);
    if let Some(pair) = candles.windows(2).find(|w| w[1].timestamp == w[0].timestamp) {
        return Err(TraderError::Data(format!(
            "duplicate candle timestamp {}",
            pair[0].timestamp
        )));
    }
    Ok(())
}
