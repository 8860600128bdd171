//! Binance K-line (candlestick) REST API client
//!
//! Fetches recent candles for the live path and paginated history for building
//! training datasets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use super::source::{check_market_token, CandleSource};
use crate::domain::Candle;
use crate::error::{Result, TraderError};

pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Max rows Binance returns per klines request
pub const KLINE_MAX_LIMIT: usize = 1000;

/// Binance K-line API client
#[derive(Debug, Clone)]
pub struct BinanceKlineClient {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceKlineClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_rows(&self, url: &str) -> Result<Vec<Vec<serde_json::Value>>> {
        debug!("Fetching K-lines: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TraderError::Data(format!(
                "K-line API error: {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Most recent `limit` K-lines (capped at 1000)
    pub async fn fetch_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        check_market_token("symbol", symbol)?;
        check_market_token("interval", interval)?;
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            interval,
            limit.clamp(1, KLINE_MAX_LIMIT)
        );

        let candles: Vec<Candle> = self
            .get_rows(&url)
            .await?
            .iter()
            .filter_map(|row| parse_kline_row(row))
            .collect();

        debug!("Fetched {} K-lines for {}", candles.len(), symbol);
        Ok(candles)
    }

    /// K-lines with open time in `[start, end)`, paging forward 1000 at a time.
    pub async fn fetch_klines_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        check_market_token("symbol", symbol)?;
        check_market_token("interval", interval)?;
        let mut out: Vec<Candle> = Vec::new();
        let mut start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();

        // Bounded so unexpected API behavior cannot loop forever.
        for _ in 0..20_000 {
            if start_ms >= end_ms {
                break;
            }

            let url = format!(
                "{}/api/v3/klines?symbol={}&interval={}&limit={}&startTime={}&endTime={}",
                self.base_url, symbol, interval, KLINE_MAX_LIMIT, start_ms, end_ms
            );

            let mut batch: Vec<Candle> = self
                .get_rows(&url)
                .await?
                .iter()
                .filter_map(|row| parse_kline_row(row))
                .collect();

            let Some(last) = batch.last() else {
                break;
            };
            let next_start_ms = last.timestamp.saturating_add(1);
            if next_start_ms <= start_ms {
                break;
            }
            start_ms = next_start_ms;
            out.append(&mut batch);

            info!(symbol, interval, fetched = out.len(), "paging K-line history");

            // Light rate limit.
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        out.retain(|c| c.timestamp < end_ms);
        out.sort_by_key(|c| c.timestamp);
        out.dedup_by_key(|c| c.timestamp);
        Ok(out)
    }
}

#[async_trait]
impl CandleSource for BinanceKlineClient {
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        self.fetch_klines(symbol, interval, limit).await
    }

    fn kind(&self) -> &'static str {
        "binance"
    }
}

/// Parse one `[open_time, "open", "high", "low", "close", "volume", close_time, ...]` row
fn parse_kline_row(row: &[serde_json::Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    let field = |i: usize| -> Option<f64> { row[i].as_str()?.parse().ok() };

    Some(Candle {
        timestamp: row[0].as_i64()?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}
