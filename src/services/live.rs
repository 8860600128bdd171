//! Live paper-trading loop.
//!
//! One [`LiveTrader`] owns the process's position/equity engine. Each tick
//! fetches recent candles, asks the policy for a target position, advances the
//! engine by the last observed candle-to-candle move, and hands the decision to
//! the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::collector::{check_market_token, SourceRegistry, KLINE_MAX_LIMIT};
use crate::domain::{render_datetime, DecisionRecord, DEFAULT_NOTE};
use crate::error::{Result, TraderError};
use crate::ml::{LoadedPolicy, PolicyProvider};
use crate::persistence::{DecisionLedger, RecordOutcome};
use crate::rl::{EngineConfig, FeatureBuilder, FeatureConfig, PositionEquityEngine, PositionState};

/// Extra candles fetched beyond the lookback so normalization has warm-up rows
pub const HISTORY_MARGIN: usize = 20;

/// Largest lookback a tick may request; the fetch must fit one exchange page
pub const MAX_LIVE_LOOKBACK: usize = KLINE_MAX_LIMIT - HISTORY_MARGIN;

/// Parameters of one live decision. Missing fields fall back to server defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TickRequest {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub lookback: Option<usize>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResponse {
    /// Decision time in seconds (open time of the latest candle)
    pub ts: i64,
    pub price: f64,
    pub action: f64,
    pub position: f64,
    pub equity: f64,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraderStatus {
    pub position: f64,
    pub equity: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
    pub trade_count: u64,
    pub total_fees: f64,
    pub model_loaded: bool,
    pub model_reference: Option<String>,
    pub model_loaded_at: Option<DateTime<Utc>>,
    pub server_time: DateTime<Utc>,
}

/// Server-side defaults for tick requests
#[derive(Debug, Clone)]
pub struct TickDefaults {
    pub symbol: String,
    pub interval: String,
    pub lookback: usize,
    pub source: Option<String>,
}

pub struct LiveTrader {
    engine: Mutex<PositionEquityEngine>,
    policy: Arc<PolicyProvider>,
    sources: SourceRegistry,
    features: FeatureBuilder,
    ledger: Arc<DecisionLedger>,
    defaults: TickDefaults,
}

impl LiveTrader {
    pub fn new(
        engine_config: EngineConfig,
        feature_config: FeatureConfig,
        policy: Arc<PolicyProvider>,
        sources: SourceRegistry,
        ledger: Arc<DecisionLedger>,
        defaults: TickDefaults,
    ) -> Self {
        Self {
            engine: Mutex::new(PositionEquityEngine::new(engine_config)),
            policy,
            sources,
            features: FeatureBuilder::new(feature_config),
            ledger,
            defaults,
        }
    }

    pub fn policy(&self) -> &Arc<PolicyProvider> {
        &self.policy
    }

    pub fn ledger(&self) -> &Arc<DecisionLedger> {
        &self.ledger
    }

    pub async fn snapshot(&self) -> PositionState {
        self.engine.lock().await.snapshot()
    }

    pub async fn reload_model(&self) -> Result<LoadedPolicy> {
        self.policy.reload().await
    }

    /// Make one decision and advance the engine.
    ///
    /// The ledger write is left to the caller (see [`LiveTrader::spawn_record`]).
    pub async fn decide(&self, request: &TickRequest) -> Result<(TickResponse, DecisionRecord)> {
        let loaded = self.policy.ensure_loaded().await?;

        let symbol = non_empty(request.symbol.as_deref()).unwrap_or(self.defaults.symbol.as_str());
        let interval = non_empty(request.interval.as_deref()).unwrap_or(self.defaults.interval.as_str());
        check_market_token("symbol", symbol)?;
        check_market_token("interval", interval)?;
        let lookback = request.lookback.unwrap_or(self.defaults.lookback);
        if lookback == 0 || lookback > MAX_LIVE_LOOKBACK {
            return Err(TraderError::Validation(format!(
                "lookback must be in 1..={MAX_LIVE_LOOKBACK}, got {lookback}"
            )));
        }
        let fetch_limit = lookback.saturating_add(HISTORY_MARGIN);
        let source_key = request
            .source
            .as_deref()
            .or(self.defaults.source.as_deref());
        let source = self.sources.resolve(source_key)?;

        let candles = source
            .fetch(symbol, interval, fetch_limit)
            .await?;
        if candles.len() < lookback.max(2) {
            return Err(TraderError::InsufficientHistory {
                required: lookback.max(2),
                available: candles.len(),
            });
        }

        let observation = self.features.build(&candles, lookback)?;
        let raw_action = loaded.policy.predict(&observation)?;

        let last = candles[candles.len() - 1];
        let prev = candles[candles.len() - 2];

        let outcome = {
            let mut engine = self.engine.lock().await;
            engine.step(raw_action, prev.close, last.close)?
        };
        if let Some(reason) = outcome.termination {
            warn!(
                %reason,
                equity = outcome.state.equity,
                drawdown = outcome.drawdown,
                "live engine hit a termination condition"
            );
        }

        let ts = last.timestamp_secs();
        let response = TickResponse {
            ts,
            price: last.close,
            action: outcome.target_position,
            position: outcome.state.position,
            equity: outcome.state.equity,
            note: DEFAULT_NOTE.to_string(),
        };
        let record = DecisionRecord {
            timestamp: ts,
            datetime: render_datetime(ts),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            price: last.close,
            action: outcome.target_position,
            position: outcome.state.position,
            equity: outcome.state.equity,
            trade_count: outcome.state.total_trades,
            model_reference: Some(loaded.reference.clone()),
            note: DEFAULT_NOTE.to_string(),
        };

        info!(
            symbol,
            interval,
            source = source.kind(),
            price = last.close,
            raw_action,
            action = response.action,
            position = response.position,
            equity = response.equity,
            "tick decided"
        );
        Ok((response, record))
    }

    /// Decide and write the ledger record before returning.
    pub async fn tick(&self, request: &TickRequest) -> Result<(TickResponse, RecordOutcome)> {
        let (response, record) = self.decide(request).await?;
        let outcome = self.ledger.record(&record).await?;
        Ok((response, outcome))
    }

    /// Write `record` in a detached task. Failures are logged; engine state is kept.
    pub fn spawn_record(&self, record: DecisionRecord) -> tokio::task::JoinHandle<()> {
        let ledger = self.ledger.clone();
        tokio::spawn(async move {
            if let Err(e) = ledger.record(&record).await {
                error!(ts = record.timestamp, error = %e, "failed to record decision");
            }
        })
    }

    pub async fn status(&self) -> TraderStatus {
        let state = self.snapshot().await;
        let loaded = self.policy.current().await;
        TraderStatus {
            position: state.position,
            equity: state.equity,
            peak_equity: state.peak_equity,
            drawdown: state.drawdown(),
            trade_count: state.total_trades,
            total_fees: state.total_fees,
            model_loaded: loaded.is_some(),
            model_reference: loaded.as_ref().map(|l| l.reference.clone()),
            model_loaded_at: loaded.as_ref().map(|l| l.loaded_at),
            server_time: Utc::now(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockCandleSource;
    use crate::domain::Candle;
    use crate::ml::ConstantPolicy;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new(1_704_067_200_000 + i as i64 * 60_000, close, close, close, close, 10.0)
            })
            .collect()
    }

    fn trader(available: usize, policy: PolicyProvider, dir: &std::path::Path) -> LiveTrader {
        let mut source = MockCandleSource::new();
        source.expect_kind().return_const("csv");
        source
            .expect_fetch()
            .returning(move |_, _, _| Ok(candles(available)));

        LiveTrader::new(
            EngineConfig::default(),
            FeatureConfig::with_lookback(10),
            Arc::new(policy),
            SourceRegistry::new().with(Arc::new(source)),
            Arc::new(DecisionLedger::local(dir)),
            TickDefaults {
                symbol: "BTCUSDT".to_string(),
                interval: "1m".to_string(),
                lookback: 10,
                source: None,
            },
        )
    }

    #[tokio::test]
    async fn test_tick_steps_engine_on_last_move() {
        let dir = tempfile::tempdir().unwrap();
        let trader = trader(
            30,
            PolicyProvider::fixed(Arc::new(ConstantPolicy::new(2.0))),
            dir.path(),
        );

        let (response, outcome) = trader.tick(&TickRequest::default()).await.unwrap();
        assert_eq!(response.action, 1.0);
        assert_eq!(response.position, 1.0);
        assert_eq!(response.price, 129.0);
        // Flat before the step, so only the fee applies: 1 * 128 * 0.001.
        assert!((response.equity - (10_000.0 - 0.128)).abs() < 1e-9);
        assert_eq!(response.ts, 1_704_067_200 + 29 * 60);
        assert_eq!(outcome, RecordOutcome::Appended { replicated: true });

        let status = trader.status().await;
        assert_eq!(status.trade_count, 1);
        assert!(status.model_loaded);
    }

    #[tokio::test]
    async fn test_short_history_is_rejected_without_stepping() {
        let dir = tempfile::tempdir().unwrap();
        let trader = trader(
            5,
            PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
            dir.path(),
        );

        let err = trader.decide(&TickRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            TraderError::InsufficientHistory { required: 10, available: 5 }
        ));
        assert_eq!(trader.snapshot().await.position, 0.0);
    }

    #[tokio::test]
    async fn test_oversized_lookback_rejected_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockCandleSource::new();
        source.expect_kind().return_const("csv");
        source.expect_fetch().never();
        let trader = LiveTrader::new(
            EngineConfig::default(),
            FeatureConfig::with_lookback(10),
            Arc::new(PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0)))),
            SourceRegistry::new().with(Arc::new(source)),
            Arc::new(DecisionLedger::local(dir.path())),
            TickDefaults {
                symbol: "BTCUSDT".to_string(),
                interval: "1m".to_string(),
                lookback: 10,
                source: None,
            },
        );

        for lookback in [usize::MAX, MAX_LIVE_LOOKBACK + 1] {
            let request = TickRequest {
                lookback: Some(lookback),
                ..TickRequest::default()
            };
            let err = trader.decide(&request).await.unwrap_err();
            assert!(matches!(err, TraderError::Validation(_)), "{lookback}");
        }
        assert_eq!(trader.snapshot().await.total_trades, 0);
    }

    #[tokio::test]
    async fn test_max_lookback_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let trader = trader(
            KLINE_MAX_LIMIT,
            PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
            dir.path(),
        );
        let request = TickRequest {
            lookback: Some(MAX_LIVE_LOOKBACK),
            ..TickRequest::default()
        };
        let (response, _) = trader.decide(&request).await.unwrap();
        assert_eq!(response.position, 1.0);
    }

    #[tokio::test]
    async fn test_missing_policy_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let trader = trader(30, PolicyProvider::unavailable(), dir.path());
        assert!(matches!(
            trader.decide(&TickRequest::default()).await,
            Err(TraderError::PolicyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_same_minute_tick_is_not_rerecorded() {
        let dir = tempfile::tempdir().unwrap();
        let trader = trader(
            30,
            PolicyProvider::fixed(Arc::new(ConstantPolicy::new(0.5))),
            dir.path(),
        );

        trader.tick(&TickRequest::default()).await.unwrap();
        let (_, second) = trader.tick(&TickRequest::default()).await.unwrap();
        assert!(matches!(second, RecordOutcome::Duplicate { .. }));
        assert_eq!(trader.ledger().recent(10).await.unwrap().len(), 1);
    }
}
