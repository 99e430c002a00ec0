//! Rate engine error types.

use std::fmt;

use thiserror::Error;

/// Why a single source failed to produce a rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// None of the recognized rate fields held a number.
    #[error("no recognized rate field (looked for {0})")]
    MissingField(String),

    #[error("rate is not a finite number")]
    NotFinite,

    #[error("rate must be positive, got {0}")]
    NonPositive(f64),

    #[error("no source registered under id {0}")]
    UnknownSource(String),
}

/// One entry of an exhausted fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub error: SourceError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("no rate sources configured")]
    NoSources,

    #[error("all rate sources failed: {}", join_failures(.0))]
    Exhausted(Vec<SourceFailure>),
}

/// Errors surfaced by the rate manager and stores.
#[derive(Debug, Error)]
pub enum RateError {
    /// Manual input that is not a number at all.
    #[error("invalid rate input '{0}': not a number")]
    InvalidInput(String),

    #[error("invalid rate {0}: must be a finite positive number")]
    InvalidRate(f64),

    #[error("rate {rate} outside accepted range [{min}, {max}]")]
    OutOfBounds { rate: f64, min: f64, max: f64 },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
