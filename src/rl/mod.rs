//! Position Simulation Core
//!
//! Feature construction, the position/equity state machine, and the
//! historical-replay environment used to train and evaluate policies.
//!
//! # Pipeline
//!
//! candles → [`FeatureBuilder`] → [`ObservationWindow`] → policy →
//! target position → [`PositionEquityEngine::step`]
//!
//! The live paper-trading loop runs the same engine one step per tick; the
//! simulator resets it once per episode.

pub mod config;
pub mod engine;
pub mod environment;
pub mod features;

pub use config::{EngineConfig, FeatureConfig, SimConfig, SimulationConfig, FEATURE_COUNT};
pub use engine::{clamp_target, PositionEquityEngine, PositionState, StepOutcome, TerminationReason};
pub use environment::{
    evaluate, run_episode, Environment, EpisodeStatus, EpisodeSummary, SimulationLoop, StepInfo,
    Transition,
};
pub use features::{FeatureBuilder, FeatureFrame, NormalizationMode, ObservationWindow};
