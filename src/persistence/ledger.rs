//! Decision ledger.
//!
//! Append-only JSON Lines, one file per UTC day (`<local_dir>/YYYYMMDD.jsonl`),
//! at most one record per minute bucket. After each append the whole
//! partition is pushed to a [`ReplicaSink`]; replication is best-effort.
//!
//! Duplicate detection is scan-then-append with no lock. Two writers racing
//! on the same minute can both append; readers must tolerate that.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::replica::{NoopReplica, ReplicaSink};
use crate::domain::{minute_bucket, partition_key, DecisionRecord};
use crate::error::{Result, TraderError};

pub const DEFAULT_REPLICA_PREFIX: &str = "logs/decisions";

/// Partitions scanned by [`DecisionLedger::recent`]
const RECENT_PARTITIONS: usize = 3;

/// Result of [`DecisionLedger::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A record for this minute already exists; nothing written
    Duplicate { bucket: i64 },
    /// Appended locally; `replicated` is false when the replica upload failed
    Appended { replicated: bool },
}

pub struct DecisionLedger {
    local_dir: PathBuf,
    replica: Arc<dyn ReplicaSink>,
    prefix: String,
}

impl DecisionLedger {
    pub fn new(
        local_dir: impl Into<PathBuf>,
        replica: Arc<dyn ReplicaSink>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            local_dir: local_dir.into(),
            replica,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Local-only ledger
    pub fn local(local_dir: impl Into<PathBuf>) -> Self {
        Self::new(local_dir, Arc::new(NoopReplica), DEFAULT_REPLICA_PREFIX)
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn replica_kind(&self) -> &'static str {
        self.replica.kind()
    }

    pub fn partition_path(&self, timestamp_secs: i64) -> PathBuf {
        self.local_dir
            .join(format!("{}.jsonl", partition_key(timestamp_secs)))
    }

    fn replica_key(&self, path: &Path) -> String {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.prefix.is_empty() {
            file
        } else {
            format!("{}/{file}", self.prefix)
        }
    }

    /// Append `record` unless its minute is already present.
    pub async fn record(&self, record: &DecisionRecord) -> Result<RecordOutcome> {
        let bucket = record.minute_bucket();
        let path = self.partition_path(record.timestamp);

        if self.bucket_exists(&path, bucket).await? {
            debug!(bucket, path = %path.display(), "decision already recorded for minute");
            return Ok(RecordOutcome::Duplicate { bucket });
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.append(&path, line.as_bytes()).await?;
        info!(
            ts = record.timestamp,
            action = record.action,
            position = record.position,
            equity = record.equity,
            "decision recorded"
        );

        let replicated = self.replicate(&path).await;
        Ok(RecordOutcome::Appended { replicated })
    }

    async fn bucket_exists(&self, path: &Path, bucket: i64) -> Result<bool> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(TraderError::ledger_io(path, e)),
        };

        Ok(parse_lines(&content, path)
            .iter()
            .any(|r| minute_bucket(r.timestamp) == bucket))
    }

    async fn append(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.local_dir)
            .await
            .map_err(|e| TraderError::ledger_io(&self.local_dir, e))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| TraderError::ledger_io(path, e))?;
        file.write_all(bytes).await.map_err(|e| TraderError::ledger_io(path, e))?;
        file.flush().await.map_err(|e| TraderError::ledger_io(path, e))?;
        Ok(())
    }

    /// Upload the whole partition. Failures are logged, never returned.
    async fn replicate(&self, path: &Path) -> bool {
        let key = self.replica_key(path);
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read partition for replication");
                return false;
            }
        };

        match self.replica.upload(&key, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    replica = self.replica.kind(),
                    %key,
                    error = %e,
                    "partition replication failed"
                );
                false
            }
        }
    }

    /// Last `limit` records from the most recent partitions, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<DecisionRecord>> {
        let mut partitions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.local_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TraderError::ledger_io(&self.local_dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TraderError::ledger_io(&self.local_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                partitions.push(path);
            }
        }
        // YYYYMMDD names sort chronologically.
        partitions.sort();
        let start = partitions.len().saturating_sub(RECENT_PARTITIONS);

        let mut records = Vec::new();
        for path in &partitions[start..] {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TraderError::ledger_io(path, e))?;
            records.extend(parse_lines(&content, path));
        }

        records.sort_by_key(|r| r.timestamp);
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<DecisionRecord> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(path = %path.display(), line = idx + 1, error = %e, "skipping malformed ledger line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{render_datetime, DEFAULT_NOTE};
    use crate::persistence::replica::MockReplicaSink;

    fn decision(ts: i64) -> DecisionRecord {
        DecisionRecord {
            timestamp: ts,
            datetime: render_datetime(ts),
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            price: 100.0,
            action: 0.5,
            position: 0.5,
            equity: 10_000.0,
            trade_count: 1,
            model_reference: None,
            note: DEFAULT_NOTE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_minute_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DecisionLedger::local(dir.path());

        let first = ledger.record(&decision(1_704_067_205)).await.unwrap();
        let second = ledger.record(&decision(1_704_067_259)).await.unwrap();
        let next_minute = ledger.record(&decision(1_704_067_260)).await.unwrap();

        assert_eq!(first, RecordOutcome::Appended { replicated: true });
        assert_eq!(second, RecordOutcome::Duplicate { bucket: 1_704_067_200 });
        assert_eq!(next_minute, RecordOutcome::Appended { replicated: true });
        assert_eq!(ledger.recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replica_receives_whole_partition() {
        let dir = tempfile::tempdir().unwrap();
        let mut replica = MockReplicaSink::new();
        replica.expect_kind().return_const("mock");
        replica
            .expect_upload()
            .withf(|key, body| {
                key.to_string() == "backup/20240101.jsonl"
                    && String::from_utf8_lossy(body).lines().count() == 1
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let ledger = DecisionLedger::new(dir.path(), Arc::new(replica), "/backup/");
        let outcome = ledger.record(&decision(1_704_067_205)).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Appended { replicated: true });
    }

    #[tokio::test]
    async fn test_replica_failure_keeps_primary() {
        let dir = tempfile::tempdir().unwrap();
        let mut replica = MockReplicaSink::new();
        replica.expect_kind().return_const("mock");
        replica
            .expect_upload()
            .returning(|_, _| Err(TraderError::Internal("bucket down".to_string())));

        let ledger = DecisionLedger::new(dir.path(), Arc::new(replica), DEFAULT_REPLICA_PREFIX);
        let outcome = ledger.record(&decision(1_704_067_205)).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Appended { replicated: false });

        let content = std::fs::read_to_string(ledger.partition_path(1_704_067_205)).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DecisionLedger::local(dir.path());
        let path = ledger.partition_path(1_704_067_205);
        std::fs::write(&path, "not json\n{\"timestamp\":\n").unwrap();

        let outcome = ledger.record(&decision(1_704_067_205)).await.unwrap();
        assert!(matches!(outcome, RecordOutcome::Appended { .. }));
        let recent = ledger.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].timestamp, 1_704_067_205);
    }

    #[tokio::test]
    async fn test_recent_reads_last_three_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DecisionLedger::local(dir.path());
        let day = 86_400;
        for d in 0..4 {
            ledger.record(&decision(1_704_067_200 + d * day)).await.unwrap();
        }

        let recent = ledger.recent(100).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].timestamp, 1_704_067_200 + day);

        let last = ledger.recent(1).await.unwrap();
        assert_eq!(last[0].timestamp, 1_704_067_200 + 3 * day);
    }

    #[tokio::test]
    async fn test_recent_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DecisionLedger::local(dir.path().join("absent"));
        assert!(ledger.recent(5).await.unwrap().is_empty());
    }
}
