use thiserror::Error;

/// Main error type for the paper trader
#[derive(Error, Debug)]
pub enum TraderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Market data errors
    #[error("Data error: {0}")]
    Data(String),

    #[error("Insufficient history: need at least {required} rows, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    // Policy errors
    #[error("Policy unavailable: {0}")]
    PolicyUnavailable(String),

    // Ledger errors (primary sink only; replica failures never surface)
    #[error("Ledger I/O error on {path}: {source}")]
    LedgerIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TraderError {
    /// Build a `LedgerIo` error for the given partition path
    pub fn ledger_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        TraderError::LedgerIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether the failure is attributable to caller-supplied input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TraderError::Data(_) | TraderError::Validation(_) | TraderError::InsufficientHistory { .. }
        )
    }
}

/// Result type alias for TraderError
pub type Result<T> = std::result::Result<T, TraderError>;
