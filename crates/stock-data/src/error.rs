//! Error types for stock data retrieval

use std::path::PathBuf;

use thiserror::Error;

use crate::model::SourceTier;

/// Failure of a single upstream data source
#[derive(Debug, Error)]
pub enum SourceError {
    /// No API key configured; the source was skipped without a request
    #[error("no API key configured")]
    MissingApiKey,

    /// Rate limit hit, either locally or reported by the provider
    #[error("rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// Non-2xx HTTP status
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// Error message embedded in an otherwise successful response
    #[error("provider error: {0}")]
    Provider(String),

    /// The source answered but had no price history for the symbol
    #[error("no price history returned")]
    NoData,

    /// A field in the payload could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// Transport-level failure reported by a client library
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured request timeout
    #[error("request timed out")]
    Timeout,

    /// Network or HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Coarse classification of a source failure, for callers that need to
/// tell a bad symbol apart from an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    RateLimited,
    Unavailable,
    Misconfigured,
    Malformed,
}

impl SourceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingApiKey => FailureKind::Misconfigured,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Provider(_) | Self::NoData => FailureKind::NotFound,
            Self::Http { status: 404 } => FailureKind::NotFound,
            Self::Http { status: 429 } => FailureKind::RateLimited,
            Self::Http { .. } | Self::Unavailable(_) | Self::Timeout | Self::Network(_) => {
                FailureKind::Unavailable
            }
            Self::Parse(_) => FailureKind::Malformed,
        }
    }
}

/// One failed attempt recorded during failover
#[derive(Debug)]
pub struct SourceFailure {
    pub tier: SourceTier,
    pub source_name: &'static str,
    pub error: SourceError,
}

/// Failure of a whole fetch after every tier was tried
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("all sources failed for {ticker}: {}", describe_attempts(.attempts))]
    Exhausted {
        ticker: String,
        attempts: Vec<SourceFailure>,
    },
}

impl FetchError {
    /// Summarise why the fetch failed.
    ///
    /// `NotFound` is reported only when every source that actually ran said
    /// the symbol has no data; any rate limit wins over a generic outage.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidTicker(_) => FailureKind::NotFound,
            Self::Exhausted { attempts, .. } => {
                let ran: Vec<FailureKind> = attempts
                    .iter()
                    .map(|a| a.error.kind())
                    .filter(|k| *k != FailureKind::Misconfigured)
                    .collect();

                if ran.is_empty() {
                    FailureKind::Misconfigured
                } else if ran.iter().all(|k| *k == FailureKind::NotFound) {
                    FailureKind::NotFound
                } else if ran.contains(&FailureKind::RateLimited) {
                    FailureKind::RateLimited
                } else {
                    FailureKind::Unavailable
                }
            }
        }
    }
}

fn describe_attempts(attempts: &[SourceFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({}): {}", a.source_name, a.tier, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cache read/write errors. Never fatal to a fetch.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for the crate
#[derive(Debug, Error)]
pub enum StockError {
    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type alias for stock data operations
pub type Result<T> = std::result::Result<T, StockError>;
