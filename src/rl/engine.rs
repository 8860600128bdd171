//! Position / Equity Engine
//!
//! The target-position state machine shared by the training simulator and the
//! live paper-trading loop. One instance owns one [`PositionState`]; the only
//! way to change that state is [`PositionEquityEngine::step`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::EngineConfig;
use crate::error::{Result, TraderError};

/// Snapshot of the engine's account state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    /// Exposure in [-1, 1]
    pub position: f64,
    pub equity: f64,
    pub peak_equity: f64,
    pub total_trades: u64,
    pub total_fees: f64,
}

impl PositionState {
    pub fn initial(balance: f64) -> Self {
        Self {
            position: 0.0,
            equity: balance,
            peak_equity: balance,
            total_trades: 0,
            total_fees: 0.0,
        }
    }

    /// Fractional decline from the running peak; 0 when the peak is not positive.
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity > 0.0 {
            (self.peak_equity - self.equity) / self.peak_equity
        } else {
            0.0
        }
    }
}

/// Why a step ended the episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Drawdown exceeded the configured ceiling
    MaxDrawdown,
    /// Equity fell to or below the configured floor
    EquityFloor,
    /// No more data to step through
    DataExhausted,
    /// Episode reached `max_episode_steps` with data left
    StepLimit,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxDrawdown => "max_drawdown",
            Self::EquityFloor => "equity_floor",
            Self::DataExhausted => "data_exhausted",
            Self::StepLimit => "step_limit",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one engine step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepOutcome {
    /// Holding return of the entered position minus the fee fraction
    pub reward: f64,
    /// State after the step
    pub state: PositionState,
    pub terminated: bool,
    pub termination: Option<TerminationReason>,
    /// Clamped target that became the new position
    pub target_position: f64,
    pub price_return: f64,
    pub trade_fee: f64,
    pub drawdown: f64,
}

/// Position/equity/fee/reward state machine
#[derive(Debug, Clone)]
pub struct PositionEquityEngine {
    config: EngineConfig,
    state: PositionState,
}

impl PositionEquityEngine {
    pub fn new(config: EngineConfig) -> Self {
        let state = PositionState::initial(config.initial_balance);
        Self { config, state }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PositionState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = PositionState::initial(self.config.initial_balance);
    }

    /// Advance one step.
    ///
    /// The holding return of this step is earned by the position held *before*
    /// the step; the fee for moving to `target_position` is deducted after.
    /// The reward scores the position just entered.
    ///
    /// Fails without touching state if either price is non-finite or
    /// `current_price` is not positive.
    pub fn step(
        &mut self,
        target_position: f64,
        current_price: f64,
        next_price: f64,
    ) -> Result<StepOutcome> {
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(TraderError::Data(format!(
                "current price must be positive and finite, got {current_price}"
            )));
        }
        if !next_price.is_finite() {
            return Err(TraderError::Data(format!(
                "next price must be finite, got {next_price}"
            )));
        }

        let target = clamp_target(target_position);
        let cfg = &self.config;
        let state = &mut self.state;

        let position_change = (target - state.position).abs();
        let trade_fee = position_change * current_price * cfg.fee_rate;
        if position_change > cfg.trade_threshold {
            state.total_trades += 1;
        }
        state.total_fees += trade_fee;

        let price_return = (next_price - current_price) / current_price;
        let position_return = state.position * price_return;

        state.equity *= 1.0 + position_return;
        state.equity -= trade_fee;
        state.position = target;

        if state.equity > state.peak_equity {
            state.peak_equity = state.equity;
        }

        let fee_fraction = trade_fee / cfg.initial_balance;
        let reward = if state.position != 0.0 {
            state.position * price_return - fee_fraction
        } else {
            -fee_fraction
        };

        let drawdown = state.drawdown();
        let termination = if drawdown > cfg.max_drawdown {
            Some(TerminationReason::MaxDrawdown)
        } else if state.equity <= cfg.initial_balance * cfg.min_equity_ratio {
            Some(TerminationReason::EquityFloor)
        } else {
            None
        };

        if let Some(reason) = termination {
            debug!(
                %reason,
                equity = state.equity,
                peak = state.peak_equity,
                drawdown,
                "engine termination condition hit"
            );
        }

        Ok(StepOutcome {
            reward,
            state: *state,
            terminated: termination.is_some(),
            termination,
            target_position: target,
            price_return,
            trade_fee,
            drawdown,
        })
    }
}

/// Clamp a raw policy output to [-1, 1]; NaN maps to flat.
pub fn clamp_target(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(-1.0, 1.0)
    }
}
