//! Candle source collaborator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Candle;
use crate::error::{Result, TraderError};

/// Longest symbol or interval accepted from a request
const MAX_TOKEN_LEN: usize = 32;

/// Reject a symbol/interval that is empty, too long, or not ASCII alphanumeric.
///
/// Both end up in file paths and exchange query strings.
pub fn check_market_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value.len() > MAX_TOKEN_LEN
        || !value.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(TraderError::Validation(format!(
            "{field} must be 1-{MAX_TOKEN_LEN} ASCII letters or digits, got {value:?}"
        )));
    }
    Ok(())
}

/// Supplies an ordered candle series for a symbol/interval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Registry key (`"binance"`, `"csv"`, ...)
    fn kind(&self) -> &'static str;
}

/// Named candle sources selectable per request
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn CandleSource>>,
    default: Option<String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its `kind()`. The first one becomes the default.
    pub fn with(mut self, source: Arc<dyn CandleSource>) -> Self {
        let key = source.kind().to_string();
        if self.default.is_none() {
            self.default = Some(key.clone());
        }
        self.sources.insert(key, source);
        self
    }

    pub fn with_default(mut self, kind: &str) -> Self {
        self.default = Some(kind.to_string());
        self
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.sources.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Resolve a requested source; `None` or empty picks the default.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn CandleSource>> {
        let key = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(k) => k.to_string(),
            None => self
                .default
                .clone()
                .ok_or_else(|| TraderError::Validation("no candle source configured".to_string()))?,
        };
        // Testnet shares the mainnet kline feed for paper trading.
        let key = if key == "binance_testnet" { "binance".to_string() } else { key };

        self.sources.get(&key).cloned().ok_or_else(|| {
            TraderError::Validation(format!(
                "unknown candle source '{key}', available: {:?}",
                self.kinds()
            ))
        })
    }
}
