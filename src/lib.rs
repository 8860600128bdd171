pub mod api;
pub mod cli;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod ml;
pub mod persistence;
pub mod rl;
pub mod services;

pub use collector::{CandleSource, SourceRegistry};
pub use config::AppConfig;
pub use domain::{Candle, DecisionRecord};
pub use error::{Result, TraderError};
pub use ml::{Policy, PolicyProvider};
pub use persistence::{DecisionLedger, RecordOutcome, ReplicaSink};
pub use rl::{
    Environment, FeatureBuilder, ObservationWindow, PositionEquityEngine, PositionState,
    SimulationLoop,
};
pub use services::LiveTrader;
