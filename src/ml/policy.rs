//! Policy collaborator.
//!
//! The engine treats a policy as an opaque `observation -> action` function.
//! [`PolicyProvider`] owns the currently loaded policy and knows how to pick
//! the newest artifact out of a model directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, TraderError};
use crate::rl::features::ObservationWindow;

/// Maps an observation window to a raw target position.
///
/// The output is not trusted to be bounded; callers clamp it.
pub trait Policy: Send + Sync {
    fn predict(&self, observation: &ObservationWindow) -> Result<f64>;

    fn name(&self) -> &str;
}

/// Always returns the same action. Baseline for evaluation and tests.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    action: f64,
    name: String,
}

impl ConstantPolicy {
    pub fn new(action: f64) -> Self {
        Self {
            action,
            name: format!("constant({action})"),
        }
    }
}

impl Policy for ConstantPolicy {
    fn predict(&self, _observation: &ObservationWindow) -> Result<f64> {
        Ok(self.action)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A policy together with where it came from
#[derive(Clone)]
pub struct LoadedPolicy {
    pub policy: Arc<dyn Policy>,
    /// Artifact path or a descriptive label
    pub reference: String,
    pub loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for LoadedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPolicy")
            .field("name", &self.policy.name())
            .field("reference", &self.reference)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

enum PolicySource {
    /// Newest artifact in a directory
    Directory { dir: PathBuf, lookback: usize },
    /// A policy supplied in-process
    Fixed(Arc<dyn Policy>),
}

/// Holds the serving policy and reloads it on demand
pub struct PolicyProvider {
    source: PolicySource,
    current: RwLock<Option<LoadedPolicy>>,
}

impl PolicyProvider {
    /// Load artifacts from `dir`; nothing is loaded until `reload`.
    pub fn from_dir(dir: impl Into<PathBuf>, lookback: usize) -> Self {
        Self {
            source: PolicySource::Directory {
                dir: dir.into(),
                lookback,
            },
            current: RwLock::new(None),
        }
    }

    /// Serve a fixed in-process policy
    pub fn fixed(policy: Arc<dyn Policy>) -> Self {
        let loaded = LoadedPolicy {
            reference: format!("inline:{}", policy.name()),
            policy: policy.clone(),
            loaded_at: Utc::now(),
        };
        Self {
            source: PolicySource::Fixed(policy),
            current: RwLock::new(Some(loaded)),
        }
    }

    /// An empty provider that can never load (for readiness tests)
    pub fn unavailable() -> Self {
        Self::from_dir(PathBuf::new(), 0)
    }

    pub async fn current(&self) -> Option<LoadedPolicy> {
        self.current.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Replace the serving policy with the newest artifact.
    ///
    /// On failure the previously loaded policy (if any) stays in place.
    pub async fn reload(&self) -> Result<LoadedPolicy> {
        let loaded = match &self.source {
            PolicySource::Fixed(policy) => LoadedPolicy {
                reference: format!("inline:{}", policy.name()),
                policy: policy.clone(),
                loaded_at: Utc::now(),
            },
            PolicySource::Directory { dir, lookback } => {
                let dir = dir.clone();
                let lookback = *lookback;
                tokio::task::spawn_blocking(move || load_latest(&dir, lookback))
                    .await
                    .map_err(|e| TraderError::Internal(format!("policy load task failed: {e}")))??
            }
        };

        info!(
            policy = loaded.policy.name(),
            reference = %loaded.reference,
            "policy loaded"
        );
        *self.current.write().await = Some(loaded.clone());
        Ok(loaded)
    }

    /// Current policy, attempting exactly one reload if none is loaded.
    pub async fn ensure_loaded(&self) -> Result<LoadedPolicy> {
        if let Some(loaded) = self.current().await {
            return Ok(loaded);
        }
        warn!("policy not loaded, attempting reload");
        self.reload().await.map_err(|e| match e {
            TraderError::PolicyUnavailable(_) => e,
            other => TraderError::PolicyUnavailable(other.to_string()),
        })
    }
}

fn is_artifact(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => true,
        #[cfg(feature = "onnx")]
        Some("onnx") => true,
        _ => false,
    }
}

/// Newest loadable artifact in `dir` by modification time
pub fn latest_artifact(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        TraderError::PolicyUnavailable(format!("cannot read model dir {}: {e}", dir.display()))
    })?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_artifact(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &newest {
            Some((ts, current)) => modified > *ts || (modified == *ts && path > *current),
            None => true,
        };
        if newer {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        TraderError::PolicyUnavailable(format!("no model artifacts in {}", dir.display()))
    })
}

fn load_latest(dir: &Path, lookback: usize) -> Result<LoadedPolicy> {
    let path = latest_artifact(dir)?;
    let policy: Arc<dyn Policy> = match path.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "onnx")]
        Some("onnx") => Arc::new(super::onnx::OnnxPolicy::load(&path, lookback)?),
        _ => {
            let dense = super::dense::DensePolicy::from_file(&path)?;
            if dense.lookback != lookback {
                return Err(TraderError::PolicyUnavailable(format!(
                    "{} was trained with lookback {}, serving lookback is {lookback}",
                    path.display(),
                    dense.lookback
                )));
            }
            Arc::new(dense)
        }
    };

    Ok(LoadedPolicy {
        policy,
        reference: path.display().to_string(),
        loaded_at: Utc::now(),
    })
}
