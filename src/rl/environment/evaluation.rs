//! Episode rollouts for evaluating a policy against the simulator.

use serde::Serialize;
use tracing::info;

use super::Environment;
use crate::error::Result;
use crate::ml::Policy;
use crate::rl::engine::TerminationReason;

/// Aggregate statistics for one finished episode
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSummary {
    pub start_index: usize,
    pub steps: usize,
    pub total_reward: f64,
    pub final_equity: f64,
    pub total_trades: u64,
    pub total_fees: f64,
    pub max_drawdown: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub termination: Option<TerminationReason>,
}

/// Roll out one episode, stopping after `step_limit` steps if the episode
/// has not ended on its own.
pub fn run_episode<E: Environment + ?Sized>(
    env: &mut E,
    policy: &dyn Policy,
    step_limit: usize,
) -> Result<EpisodeSummary> {
    let (mut observation, start) = env.reset()?;

    let mut summary = EpisodeSummary {
        start_index: start.step,
        steps: 0,
        total_reward: 0.0,
        final_equity: start.state.equity,
        total_trades: 0,
        total_fees: 0.0,
        max_drawdown: 0.0,
        terminated: false,
        truncated: false,
        termination: None,
    };

    while summary.steps < step_limit {
        let action = policy.predict(&observation)?;
        let transition = env.step(action)?;

        summary.steps += 1;
        summary.total_reward += transition.reward;
        summary.final_equity = transition.info.state.equity;
        summary.total_trades = transition.info.state.total_trades;
        summary.total_fees = transition.info.state.total_fees;
        summary.max_drawdown = summary.max_drawdown.max(transition.info.drawdown);

        if transition.is_done() {
            summary.terminated = transition.terminated;
            summary.truncated = transition.truncated;
            summary.termination = transition.info.termination;
            break;
        }
        observation = transition.observation;
    }

    Ok(summary)
}

/// Run `episodes` rollouts with the same policy
pub fn evaluate<E: Environment + ?Sized>(
    env: &mut E,
    policy: &dyn Policy,
    episodes: usize,
    step_limit: usize,
) -> Result<Vec<EpisodeSummary>> {
    let mut results = Vec::with_capacity(episodes);
    for episode in 0..episodes {
        let summary = run_episode(env, policy, step_limit)?;
        info!(
            episode,
            policy = policy.name(),
            steps = summary.steps,
            reward = summary.total_reward,
            equity = summary.final_equity,
            trades = summary.total_trades,
            termination = ?summary.termination,
            "episode finished"
        );
        results.push(summary);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use crate::ml::ConstantPolicy;
    use crate::rl::config::{EngineConfig, FeatureConfig, SimConfig, SimulationConfig};
    use crate::rl::environment::SimulationLoop;

    fn sim(drift: f64) -> SimulationLoop {
        let candles: Vec<Candle> = (0..400)
            .map(|i| {
                let close = 100.0 * (1.0 + drift).powi(i);
                Candle::new(60_000 * i as i64, close, close, close, close, 5.0)
            })
            .collect();
        SimulationLoop::new(
            &candles,
            SimConfig {
                engine: EngineConfig {
                    initial_balance: 1000.0,
                    ..EngineConfig::default()
                },
                features: FeatureConfig::with_lookback(30),
                simulation: SimulationConfig {
                    max_episode_steps: 100,
                    seed: Some(1),
                },
            },
        )
        .unwrap()
    }

    #[test]
    fn test_flat_policy_never_trades() {
        let mut env = sim(0.001);
        let summary = run_episode(&mut env, &ConstantPolicy::new(0.0), 1_000).unwrap();
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.total_fees, 0.0);
        assert_eq!(summary.final_equity, 1000.0);
        assert!(summary.truncated);
    }

    #[test]
    fn test_short_in_uptrend_hits_drawdown() {
        let mut env = sim(0.01);
        let summary = run_episode(&mut env, &ConstantPolicy::new(-1.0), 1_000).unwrap();
        assert!(summary.terminated);
        assert_eq!(summary.termination, Some(TerminationReason::MaxDrawdown));
        assert!(summary.max_drawdown > 0.10);
    }

    #[test]
    fn test_evaluate_runs_requested_episodes() {
        let mut env = sim(0.0005);
        let results = evaluate(&mut env, &ConstantPolicy::new(0.5), 3, 20).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.steps == 20));
    }
}
