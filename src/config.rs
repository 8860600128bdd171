use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::collector::check_market_token;
use crate::rl::{EngineConfig, FeatureConfig, SimConfig, SimulationConfig};
use crate::services::MAX_LIVE_LOOKBACK;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub features: FeatureConfig,
    pub simulation: SimulationConfig,
    pub ledger: LedgerConfig,
    pub policy: PolicyConfig,
    pub server: ServerConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding `YYYYMMDD.jsonl` partitions
    pub local_dir: PathBuf,
    pub backup: BackupConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("logs/decisions"),
            backup: BackupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// Replication disabled
    #[default]
    None,
    /// Mirror into another directory
    Directory,
    /// HTTP PUT to an object store
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub kind: BackupKind,
    /// Mirror root for `directory`
    pub dir: Option<PathBuf>,
    /// Base URL for `http`
    pub url: Option<String>,
    /// Bearer token for `http`
    pub token: Option<String>,
    /// Key prefix under which partitions are stored
    pub prefix: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            kind: BackupKind::None,
            dir: None,
            url: None,
            token: None,
            prefix: "logs/decisions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Directory searched for the newest model artifact
    pub model_dir: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Symbol used when a tick request omits one
    pub symbol: String,
    /// Interval used when a tick request omits one
    pub interval: String,
    /// Candle source used when a tick request omits one
    pub source: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            source: "binance".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `btc_data_<interval>.csv` datasets
    pub dataset_dir: PathBuf,
    pub file_template: String,
    /// Binance REST base URL
    pub binance_url: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("data"),
            file_template: "btc_data_{interval}.csv".to_string(),
            binance_url: crate::collector::BINANCE_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("PAPER_TRADER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (PAPER_TRADER__ENGINE__FEE_RATE, etc.)
            .add_source(
                Environment::with_prefix("PAPER_TRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Simulator settings derived from this config
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            engine: self.engine.clone(),
            features: self.features.clone(),
            simulation: self.simulation.clone(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.engine.validate();
        errors.extend(self.features.validate());

        if self.simulation.max_episode_steps == 0 {
            errors.push("simulation.max_episode_steps must be > 0".to_string());
        }

        match self.ledger.backup.kind {
            BackupKind::Directory if self.ledger.backup.dir.is_none() => {
                errors.push("ledger.backup.dir is required for directory backups".to_string());
            }
            BackupKind::Http if self.ledger.backup.url.is_none() => {
                errors.push("ledger.backup.url is required for http backups".to_string());
            }
            _ => {}
        }

        if self.features.lookback > MAX_LIVE_LOOKBACK {
            errors.push(format!(
                "features.lookback must be <= {MAX_LIVE_LOOKBACK} for live ticks"
            ));
        }
        for (field, value) in [
            ("server.symbol", &self.server.symbol),
            ("server.interval", &self.server.interval),
        ] {
            if let Err(e) = check_market_token(field, value) {
                errors.push(e.to_string());
            }
        }
        if !self.data.file_template.contains("{interval}") {
            errors.push("data.file_template must contain {interval}".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
