//! Best-effort replicas of ledger partitions.
//!
//! A replica receives the whole partition file after each append and
//! overwrites its copy, so the latest upload is always a full snapshot.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TraderError};

/// Destination for full-partition snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplicaSink: Send + Sync {
    /// Overwrite the object at `key` with `body`
    async fn upload(&self, key: &str, body: Vec<u8>) -> Result<()>;

    fn kind(&self) -> &'static str;
}

/// Replication disabled
#[derive(Debug, Clone, Default)]
pub struct NoopReplica;

#[async_trait]
impl ReplicaSink for NoopReplica {
    async fn upload(&self, _key: &str, _body: Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "none"
    }
}

/// Mirrors partitions under another directory (e.g. a mounted bucket)
#[derive(Debug, Clone)]
pub struct DirectoryReplica {
    root: PathBuf,
}

impl DirectoryReplica {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ReplicaSink for DirectoryReplica {
    async fn upload(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never observe a torn snapshot.
        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "replicated partition");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "directory"
    }
}

/// PUTs partitions to an object-store style HTTP endpoint (`<base_url>/<key>`)
#[derive(Debug, Clone)]
pub struct HttpObjectReplica {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpObjectReplica {
    pub fn new(base_url: &str, bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ReplicaSink for HttpObjectReplica {
    async fn upload(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(key);
        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TraderError::Internal(format!(
                "replica upload to {url} failed: {}",
                response.status()
            )));
        }
        debug!(%url, "replicated partition");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
