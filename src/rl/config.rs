//! Simulation Configuration
//!
//! Configuration structs for the feature pipeline, the position/equity engine,
//! and the episode driver.

use serde::{Deserialize, Serialize};

/// Number of feature columns in an observation row
pub const FEATURE_COUNT: usize = 6;

/// Position/equity engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting (and reset) equity
    pub initial_balance: f64,
    /// Fee charged per unit of position change, as a fraction of price
    pub fee_rate: f64,
    /// Drawdown ceiling; exceeding it terminates the episode
    pub max_drawdown: f64,
    /// Equity floor as a fraction of the initial balance
    pub min_equity_ratio: f64,
    /// Minimum position change counted as a trade
    pub trade_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            fee_rate: 0.001,
            max_drawdown: 0.10,
            min_equity_ratio: 0.10,
            trade_threshold: 0.01,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            errors.push("engine.initial_balance must be positive".to_string());
        }
        if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0) {
            errors.push("engine.fee_rate must be non-negative".to_string());
        }
        if !(self.max_drawdown > 0.0 && self.max_drawdown <= 1.0) {
            errors.push("engine.max_drawdown must be in (0, 1]".to_string());
        }
        if !(self.min_equity_ratio >= 0.0 && self.min_equity_ratio < 1.0) {
            errors.push("engine.min_equity_ratio must be in [0, 1)".to_string());
        }
        if !(self.trade_threshold >= 0.0) {
            errors.push("engine.trade_threshold must be non-negative".to_string());
        }
        errors
    }
}

/// Feature pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rows per observation window
    pub lookback: usize,
    /// Upper bound on the rolling normalization window
    pub max_rolling_window: usize,
    /// Rolling windows shorter than this fall back to global statistics
    pub min_rolling_window: usize,
    /// Observations required before a rolling statistic is defined
    pub min_periods: usize,
    /// Symmetric clip applied to per-candle returns
    pub return_clip: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            max_rolling_window: 100,
            min_rolling_window: 20,
            min_periods: 10,
            return_clip: 0.1,
        }
    }
}

impl FeatureConfig {
    pub fn with_lookback(lookback: usize) -> Self {
        Self {
            lookback,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.lookback == 0 {
            errors.push("features.lookback must be > 0".to_string());
        }
        if self.min_periods == 0 {
            errors.push("features.min_periods must be > 0".to_string());
        }
        if self.min_rolling_window < self.min_periods {
            errors.push("features.min_rolling_window must be >= min_periods".to_string());
        }
        if !(self.return_clip > 0.0) {
            errors.push("features.return_clip must be positive".to_string());
        }
        errors
    }
}

/// Episode driver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Maximum steps per episode
    pub max_episode_steps: usize,
    /// RNG seed for start-index selection (random if unset)
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: 10_000,
            seed: None,
        }
    }
}

/// Everything the training-time simulator needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub engine: EngineConfig,
    pub features: FeatureConfig,
    pub simulation: SimulationConfig,
}
