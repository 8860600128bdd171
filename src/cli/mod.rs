use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod output;

pub use output::{print_items, DecisionRow, EpisodeRow, OutputMode};

#[derive(Parser)]
#[command(name = "paper-trader")]
#[command(version)]
#[command(about = "Single-asset target-position paper trading agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus per-environment overrides)
    #[arg(short, long, default_value = "config", env = "PAPER_TRADER_CONFIG_DIR")]
    pub config: PathBuf,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (/tick, /status, /recent, ...)
    Serve {
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Make one live decision and record it
    Tick {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        /// Candle source (binance, csv)
        #[arg(long)]
        source: Option<String>,
    },
    /// Replay episodes over a CSV dataset
    Simulate {
        /// Dataset path (default: <data.dataset_dir>/btc_data_<interval>.csv)
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long, default_value = "5m")]
        interval: String,
        #[arg(short, long, default_value = "5")]
        episodes: usize,
        /// Use a constant target position instead of the model directory
        #[arg(long, allow_hyphen_values = true)]
        action: Option<f64>,
        /// Cap on steps per episode (default: simulation.max_episode_steps)
        #[arg(long)]
        steps: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Reset and take five random actions, logging every step
        #[arg(long)]
        check: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a seeded synthetic dataset (offline testing only)
    GenerateData {
        #[arg(short, long, default_value = "data/btc_data_5m.csv")]
        output: PathBuf,
        #[arg(short = 'n', long, default_value = "20000")]
        rows: usize,
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Download exchange K-lines into a CSV dataset
    FetchData {
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(long, default_value = "5m")]
        interval: String,
        /// Days of history ending now
        #[arg(long, default_value = "30")]
        days: i64,
        /// Output path (default: <data.dataset_dir>/btc_data_<interval>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show recent ledger decisions
    Recent {
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulate_with_negative_action() {
        let cli = Cli::try_parse_from([
            "paper-trader",
            "simulate",
            "--action",
            "-0.5",
            "--episodes",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate { action, episodes, check, .. } => {
                assert_eq!(action, Some(-0.5));
                assert_eq!(episodes, 2);
                assert!(!check);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
