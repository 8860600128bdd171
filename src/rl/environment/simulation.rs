//! Historical Replay Simulator
//!
//! Drives a [`PositionEquityEngine`] over a precomputed [`FeatureFrame`],
//! one candle per step, for policy training and evaluation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use super::{Environment, Transition};
use crate::domain::Candle;
use crate::error::{Result, TraderError};
use crate::rl::config::SimConfig;
use crate::rl::engine::{PositionEquityEngine, PositionState, TerminationReason};
use crate::rl::features::{FeatureBuilder, FeatureFrame, ObservationWindow};

/// Episode lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// Constructed but never reset
    Idle,
    Running,
    Terminated,
    Truncated,
}

/// Per-step diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    /// Cursor into the feature frame
    pub step: usize,
    /// Steps taken in this episode
    pub episode_step: usize,
    /// Realized price (close at the cursor)
    pub price: f64,
    pub state: PositionState,
    pub drawdown: f64,
    pub termination: Option<TerminationReason>,
}

/// Training-time simulator over one historical dataset
pub struct SimulationLoop {
    config: SimConfig,
    frame: FeatureFrame,
    engine: PositionEquityEngine,
    rng: StdRng,
    cursor: usize,
    episode_start: usize,
    episode_steps: usize,
    status: EpisodeStatus,
}

impl SimulationLoop {
    /// Build features for `candles` and check the dataset can hold an episode.
    pub fn new(candles: &[Candle], config: SimConfig) -> Result<Self> {
        let frame = FeatureBuilder::new(config.features.clone()).compute(candles)?;
        Self::from_frame(frame, config)
    }

    pub fn from_frame(frame: FeatureFrame, config: SimConfig) -> Result<Self> {
        let lookback = config.features.lookback;
        if lookback == 0 {
            return Err(TraderError::Validation("lookback must be > 0".to_string()));
        }
        let required = lookback + config.simulation.max_episode_steps + 1;
        if frame.len() < required {
            return Err(TraderError::InsufficientHistory {
                required,
                available: frame.len(),
            });
        }

        let rng = match config.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            rows = frame.len(),
            offset = frame.offset(),
            mode = ?frame.mode(),
            lookback,
            max_episode_steps = config.simulation.max_episode_steps,
            "simulation dataset ready"
        );

        Ok(Self {
            engine: PositionEquityEngine::new(config.engine.clone()),
            config,
            frame,
            rng,
            cursor: 0,
            episode_start: 0,
            episode_steps: 0,
            status: EpisodeStatus::Idle,
        })
    }

    /// Reseed the start-index RNG
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn episode_start(&self) -> usize {
        self.episode_start
    }

    pub fn data_len(&self) -> usize {
        self.frame.len()
    }

    pub fn state(&self) -> PositionState {
        self.engine.snapshot()
    }

    /// Inclusive range of valid episode start indices
    pub fn start_range(&self) -> (usize, usize) {
        let lookback = self.config.features.lookback;
        let max_start = self.frame.len() - self.config.simulation.max_episode_steps - 1;
        (lookback, max_start.max(lookback))
    }

    fn observation(&self) -> ObservationWindow {
        self.frame
            .window_ending_at(self.cursor, self.config.features.lookback)
    }

    fn price_at(&self, idx: usize) -> Result<f64> {
        self.frame.close(idx).ok_or_else(|| {
            TraderError::Internal(format!(
                "cursor {idx} outside dataset of {} rows",
                self.frame.len()
            ))
        })
    }

    fn info(&self, price: f64, termination: Option<TerminationReason>) -> StepInfo {
        let state = self.engine.snapshot();
        StepInfo {
            step: self.cursor,
            episode_step: self.episode_steps,
            price,
            state,
            drawdown: state.drawdown(),
            termination,
        }
    }

    fn last_index(&self) -> usize {
        self.frame.len() - 1
    }
}

impl Environment for SimulationLoop {
    fn reset(&mut self) -> Result<(ObservationWindow, StepInfo)> {
        let (low, high) = self.start_range();
        if low > high || high >= self.frame.len() {
            return Err(TraderError::InsufficientHistory {
                required: self.config.features.lookback
                    + self.config.simulation.max_episode_steps
                    + 1,
                available: self.frame.len(),
            });
        }

        self.cursor = self.rng.gen_range(low..=high);
        self.episode_start = self.cursor;
        self.episode_steps = 0;
        self.engine.reset();
        self.status = EpisodeStatus::Running;

        debug!(start = self.cursor, "episode reset");

        let price = self.price_at(self.cursor)?;
        Ok((self.observation(), self.info(price, None)))
    }

    /// Steps after the episode ended are rejected until the next `reset`.
    fn step(&mut self, action: f64) -> Result<Transition> {
        match self.status {
            EpisodeStatus::Running => {}
            EpisodeStatus::Idle => {
                return Err(TraderError::Validation(
                    "step called before reset".to_string(),
                ));
            }
            EpisodeStatus::Terminated | EpisodeStatus::Truncated => {
                return Err(TraderError::Validation(
                    "step called after episode ended; call reset".to_string(),
                ));
            }
        }

        if self.cursor >= self.last_index() {
            self.status = EpisodeStatus::Terminated;
            let price = self.price_at(self.cursor)?;
            return Ok(Transition {
                observation: self.observation(),
                reward: 0.0,
                terminated: true,
                truncated: false,
                info: self.info(price, Some(TerminationReason::DataExhausted)),
            });
        }

        let current_price = self.price_at(self.cursor)?;
        let next_price = self.price_at(self.cursor + 1)?;
        let outcome = self.engine.step(action, current_price, next_price)?;

        self.cursor += 1;
        self.episode_steps += 1;

        let data_left = self.cursor < self.last_index();
        let step_cap = self.episode_steps >= self.config.simulation.max_episode_steps;
        let truncated = !data_left || step_cap;
        let termination = match outcome.termination {
            Some(reason) => Some(reason),
            None if !data_left => Some(TerminationReason::DataExhausted),
            None if step_cap => Some(TerminationReason::StepLimit),
            None => None,
        };

        self.status = if outcome.terminated {
            EpisodeStatus::Terminated
        } else if truncated {
            EpisodeStatus::Truncated
        } else {
            EpisodeStatus::Running
        };

        Ok(Transition {
            observation: self.observation(),
            reward: outcome.reward,
            terminated: outcome.terminated,
            truncated,
            info: self.info(next_price, termination),
        })
    }
}
