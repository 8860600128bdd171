//! Wiring from [`AppConfig`] to live components.

use std::sync::Arc;
use tracing::{info, warn};

use crate::collector::{BinanceKlineClient, CsvCandleSource, SourceRegistry};
use crate::config::{AppConfig, BackupKind};
use crate::error::{Result, TraderError};
use crate::ml::PolicyProvider;
use crate::persistence::{DecisionLedger, DirectoryReplica, HttpObjectReplica, NoopReplica, ReplicaSink};
use crate::services::live::{LiveTrader, TickDefaults};

/// Replica sink selected by `ledger.backup.kind`
pub fn build_replica(config: &AppConfig) -> Result<Arc<dyn ReplicaSink>> {
    let backup = &config.ledger.backup;
    let replica: Arc<dyn ReplicaSink> = match backup.kind {
        BackupKind::None => Arc::new(NoopReplica),
        BackupKind::Directory => {
            let dir = backup.dir.clone().ok_or_else(|| {
                TraderError::Validation("ledger.backup.dir is required".to_string())
            })?;
            Arc::new(DirectoryReplica::new(dir))
        }
        BackupKind::Http => {
            let url = backup.url.as_deref().ok_or_else(|| {
                TraderError::Validation("ledger.backup.url is required".to_string())
            })?;
            Arc::new(HttpObjectReplica::new(url, backup.token.clone())?)
        }
    };
    Ok(replica)
}

pub fn build_ledger(config: &AppConfig) -> Result<DecisionLedger> {
    let replica = build_replica(config)?;
    info!(
        local_dir = %config.ledger.local_dir.display(),
        replica = replica.kind(),
        "decision ledger ready"
    );
    Ok(DecisionLedger::new(
        config.ledger.local_dir.clone(),
        replica,
        config.ledger.backup.prefix.clone(),
    ))
}

/// Live candle sources. Synthetic data is never registered here.
pub fn build_sources(config: &AppConfig) -> Result<SourceRegistry> {
    let binance = BinanceKlineClient::with_base_url(&config.data.binance_url)?;
    let csv = CsvCandleSource::new(
        config.data.dataset_dir.clone(),
        config.data.file_template.clone(),
    );
    Ok(SourceRegistry::new()
        .with(Arc::new(binance))
        .with(Arc::new(csv))
        .with_default(&config.server.source))
}

/// Build the live trader and try an initial model load.
pub async fn build_trader(config: &AppConfig) -> Result<LiveTrader> {
    let policy = Arc::new(PolicyProvider::from_dir(
        config.policy.model_dir.clone(),
        config.features.lookback,
    ));
    if let Err(e) = policy.reload().await {
        // Ticks retry the load once; until then the service reports 503.
        warn!(error = %e, "no policy loaded at startup");
    }

    Ok(LiveTrader::new(
        config.engine.clone(),
        config.features.clone(),
        policy,
        build_sources(config)?,
        Arc::new(build_ledger(config)?),
        TickDefaults {
            symbol: config.server.symbol.clone(),
            interval: config.server.interval.clone(),
            lookback: config.features.lookback,
            source: Some(config.server.source.clone()),
        },
    ))
}
