//! Command runners for the `paper-trader` binary.

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::output::{print_items, DecisionRow, EpisodeRow, OutputMode};
use crate::api::{create_router, AppState};
use crate::collector::{
    generate_sample_data, load_candles, save_candles, BinanceKlineClient, CsvCandleSource,
    SyntheticSpec,
};
use crate::config::AppConfig;
use crate::ml::{ConstantPolicy, Policy, PolicyProvider};
use crate::rl::{evaluate, Environment, SimulationLoop};
use crate::services::{build_ledger, build_trader, TickRequest};

fn default_dataset(config: &AppConfig, interval: &str) -> crate::Result<PathBuf> {
    CsvCandleSource::new(&config.data.dataset_dir, config.data.file_template.as_str())
        .path_for(interval)
}

pub async fn run_serve(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    let trader = Arc::new(build_trader(config).await?);
    let app = create_router(AppState::new(trader));

    let addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "paper trader API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

pub async fn run_tick(config: &AppConfig, request: TickRequest) -> anyhow::Result<()> {
    let trader = build_trader(config).await?;
    let (response, outcome) = trader.tick(&request).await?;
    info!(?outcome, "tick complete");
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub struct SimulateArgs {
    pub data: Option<PathBuf>,
    pub interval: String,
    pub episodes: usize,
    pub action: Option<f64>,
    pub steps: Option<usize>,
    pub seed: Option<u64>,
    pub check: bool,
    pub mode: OutputMode,
}

pub async fn run_simulate(config: &AppConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let path = match args.data.clone() {
        Some(path) => path,
        None => default_dataset(config, &args.interval)?,
    };
    let candles = load_candles(&path)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    info!(rows = candles.len(), path = %path.display(), "dataset loaded");

    let mut sim_config = config.sim_config();
    if args.seed.is_some() {
        sim_config.simulation.seed = args.seed;
    }
    if let Some(steps) = args.steps {
        sim_config.simulation.max_episode_steps = steps;
    }
    let step_limit = sim_config.simulation.max_episode_steps;
    let mut env = SimulationLoop::new(&candles, sim_config)?;

    if args.check {
        return self_check(&mut env);
    }

    let policy: Arc<dyn Policy> = match args.action {
        Some(action) => Arc::new(ConstantPolicy::new(action)),
        None => {
            let provider =
                PolicyProvider::from_dir(config.policy.model_dir.clone(), config.features.lookback);
            provider.ensure_loaded().await?.policy
        }
    };

    let summaries = evaluate(&mut env, policy.as_ref(), args.episodes, step_limit)?;
    let rows: Vec<EpisodeRow> = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| EpisodeRow::new(i, s))
        .collect();
    print_items(&rows, args.mode)
}

/// Reset and take five random actions, logging each transition.
fn self_check(env: &mut SimulationLoop) -> anyhow::Result<()> {
    let (observation, info) = env.reset()?;
    let (start, end) = env.start_range();
    info!(
        shape = ?observation.batched_shape(),
        start = info.step,
        start_range = ?(start, end),
        "environment reset"
    );

    let mut rng = rand::thread_rng();
    for i in 0..5 {
        let action: f64 = rng.gen_range(-1.0..=1.0);
        let transition = env.step(action)?;
        info!(
            step = i,
            action,
            reward = transition.reward,
            position = transition.info.state.position,
            equity = transition.info.state.equity,
            terminated = transition.terminated,
            truncated = transition.truncated,
            "check step"
        );
        if transition.is_done() {
            env.reset()?;
        }
    }
    println!("environment check passed");
    Ok(())
}

pub fn run_generate_data(output: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    let candles = generate_sample_data(rows, seed, &SyntheticSpec::default());
    save_candles(&candles, output)?;
    info!(rows, seed, path = %output.display(), "synthetic dataset written");
    println!("wrote {} synthetic candles to {}", candles.len(), output.display());
    Ok(())
}

pub async fn run_fetch_data(
    config: &AppConfig,
    symbol: &str,
    interval: &str,
    days: i64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    anyhow::ensure!(days > 0, "days must be positive");
    let client = BinanceKlineClient::with_base_url(&config.data.binance_url)?;
    let end = Utc::now();
    let start = end - Duration::days(days);

    let candles = client.fetch_klines_range(symbol, interval, start, end).await?;
    anyhow::ensure!(!candles.is_empty(), "no candles returned for {symbol} {interval}");

    let path = match output {
        Some(path) => path,
        None => default_dataset(config, interval)?,
    };
    save_candles(&candles, &path)?;
    println!("wrote {} candles to {}", candles.len(), path.display());
    Ok(())
}

pub async fn run_recent(config: &AppConfig, limit: usize, mode: OutputMode) -> anyhow::Result<()> {
    let ledger = build_ledger(config)?;
    let records = ledger.recent(limit).await?;
    let rows: Vec<DecisionRow> = records.iter().map(DecisionRow::from).collect();
    print_items(&rows, mode)
}
