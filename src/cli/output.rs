//! Output formatting for CLI commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::DecisionRecord;
use crate::rl::EpisodeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct EpisodeRow {
    pub episode: usize,
    pub start: usize,
    pub steps: usize,
    pub reward: String,
    pub equity: String,
    pub trades: u64,
    pub fees: String,
    pub max_dd: String,
    pub end: String,
}

impl EpisodeRow {
    pub fn new(episode: usize, s: &EpisodeSummary) -> Self {
        let end = match (s.termination, s.truncated) {
            (Some(reason), _) => reason.to_string(),
            (None, true) => "truncated".to_string(),
            (None, false) => "stopped".to_string(),
        };
        Self {
            episode,
            start: s.start_index,
            steps: s.steps,
            reward: format!("{:.5}", s.total_reward),
            equity: format!("{:.2}", s.final_equity),
            trades: s.total_trades,
            fees: format!("{:.2}", s.total_fees),
            max_dd: format!("{:.2}%", s.max_drawdown * 100.0),
            end,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DecisionRow {
    pub datetime: String,
    pub symbol: String,
    pub price: String,
    pub action: String,
    pub position: String,
    pub equity: String,
    pub trades: u64,
}

impl From<&DecisionRecord> for DecisionRow {
    fn from(r: &DecisionRecord) -> Self {
        Self {
            datetime: r.datetime.clone(),
            symbol: r.symbol.clone(),
            price: format!("{:.2}", r.price),
            action: format!("{:+.3}", r.action),
            position: format!("{:+.3}", r.position),
            equity: format!("{:.2}", r.equity),
            trades: r.trade_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_row_end_label() {
        let summary = EpisodeSummary {
            start_index: 60,
            steps: 10,
            total_reward: 0.01,
            final_equity: 10_100.0,
            total_trades: 1,
            total_fees: 10.0,
            max_drawdown: 0.02,
            terminated: false,
            truncated: true,
            termination: None,
        };
        let row = EpisodeRow::new(0, &summary);
        assert_eq!(row.end, "truncated");
        assert_eq!(row.max_dd, "2.00%");
    }
}
