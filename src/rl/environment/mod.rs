//! Trading Environments
//!
//! The `reset`/`step` contract policies are trained against, and the
//! historical-replay simulator that implements it.

mod evaluation;
mod simulation;

pub use evaluation::{evaluate, run_episode, EpisodeSummary};
pub use simulation::{EpisodeStatus, SimulationLoop, StepInfo};

use crate::error::Result;
use crate::rl::features::ObservationWindow;

/// Outcome of one environment step
#[derive(Debug, Clone)]
pub struct Transition {
    pub observation: ObservationWindow,
    pub reward: f64,
    /// The episode failed (drawdown, equity floor, or no data left)
    pub terminated: bool,
    /// The episode ran out of runway
    pub truncated: bool,
    pub info: StepInfo,
}

impl Transition {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Episode-based environment driven by a scalar target-position action
pub trait Environment {
    /// Start a new episode
    fn reset(&mut self) -> Result<(ObservationWindow, StepInfo)>;

    /// Apply one action and advance by one candle
    fn step(&mut self, action: f64) -> Result<Transition>;
}
