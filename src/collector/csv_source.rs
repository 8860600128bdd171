//! CSV candle datasets.
//!
//! Files carry a header with at least `timestamp,open,high,low,close,volume`;
//! extra columns are ignored.

use async_trait::async_trait;
use csv::{Reader, Writer};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use super::source::{check_market_token, CandleSource};
use crate::domain::{sort_and_dedup_check, Candle};
use crate::error::{Result, TraderError};

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Load a candle CSV, sorted by timestamp.
///
/// Missing columns, unparsable rows, and duplicate timestamps are `Data` errors.
pub fn load_candles<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| TraderError::Data(format!("cannot open dataset {}: {e}", path.display())))?;

    let mut reader = Reader::from_reader(file);
    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(TraderError::Data(format!(
            "{} is missing required columns: {missing:?}",
            path.display()
        )));
    }

    let mut candles = Vec::new();
    for (idx, result) in reader.deserialize().enumerate() {
        let candle: Candle = result.map_err(|e| {
            TraderError::Data(format!("{} row {}: {e}", path.display(), idx + 1))
        })?;
        candles.push(candle);
    }

    sort_and_dedup_check(&mut candles)?;
    Ok(candles)
}

/// Write candles as CSV with the canonical header
pub fn save_candles<P: AsRef<Path>>(candles: &[Candle], path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = Writer::from_path(&path)?;
    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serves the tail of a local dataset per interval
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    dir: PathBuf,
    /// File name with an `{interval}` placeholder
    file_template: String,
}

impl CsvCandleSource {
    pub fn new(dir: impl Into<PathBuf>, file_template: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_template: file_template.into(),
        }
    }

    /// Dataset path for `interval`. Intervals that could escape `dir` are rejected.
    pub fn path_for(&self, interval: &str) -> Result<PathBuf> {
        check_market_token("interval", interval)?;
        Ok(self
            .dir
            .join(self.file_template.replace("{interval}", interval)))
    }
}

#[async_trait]
impl CandleSource for CsvCandleSource {
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let path = self.path_for(interval)?;
        let load_path = path.clone();
        let mut candles = tokio::task::spawn_blocking(move || load_candles(load_path))
            .await
            .map_err(|e| TraderError::Internal(format!("dataset load task failed: {e}")))??;

        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        info!(
            symbol,
            interval,
            rows = candles.len(),
            path = %path.display(),
            "loaded candles from dataset"
        );
        Ok(candles)
    }

    fn kind(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "timestamp,open,high,low,close\n1,1,1,1,1\n").unwrap();
        let err = load_candles(&path).unwrap_err();
        assert!(matches!(err, TraderError::Data(ref m) if m.contains("volume")));
    }

    #[test]
    fn test_extra_columns_ignored_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume,returns\n\
             120000,2,2,2,2,10,0.0\n\
             60000,1,1,1,1,10,\n",
        )
        .unwrap();
        let candles = load_candles(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 60_000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let candles = vec![
            Candle::new(0, 1.0, 2.0, 0.5, 1.5, 3.0),
            Candle::new(60_000, 1.5, 2.5, 1.0, 2.0, 4.0),
        ];
        save_candles(&candles, &path).unwrap();
        assert_eq!(load_candles(&path).unwrap(), candles);
    }

    #[tokio::test]
    async fn test_source_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle::new(i * 60_000, 1.0, 1.0, 1.0, 1.0 + i as f64, 1.0))
            .collect();
        let source = CsvCandleSource::new(dir.path(), "btc_data_{interval}.csv");
        save_candles(&candles, source.path_for("5m").unwrap()).unwrap();

        let tail = source.fetch("BTCUSDT", "5m", 3).await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[2].close, 10.0);
        assert!(source.fetch("BTCUSDT", "1h", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_interval_cannot_escape_dataset_dir() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let candles = vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)];
        save_candles(&candles, root.path().join("btc_data_.csv")).unwrap();

        let source = CsvCandleSource::new(&data, "btc_data_{interval}.csv");
        let err = source.fetch("BTCUSDT", "../btc_data_", 5).await.unwrap_err();
        assert!(matches!(err, TraderError::Validation(_)));
        assert!(source.path_for("/etc/passwd").is_err());
    }
}
