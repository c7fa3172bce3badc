// src/error.rs
//! Typed failures for every pipeline stage.
//!
//! Source-level errors (`RegistryError`, `CrawlError`) end a source's pipeline.
//! Item-level outcomes (`Rejection`, `PersistError`) are absorbed into the run report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source resolution failures. Fatal to the affected source only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown source `{0}`")]
    UnknownSource(String),
    #[error("source `{source_id}` declares crawler type `{tag}` with no registered implementation")]
    UnresolvedCrawlerType { source_id: String, tag: String },
}

/// Source-level crawl failure (`CrawlerFetchError`). Never raised for a single bad item.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetching {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("parsing response from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("invalid crawler parameters: {0}")]
    InvalidParams(String),
}

impl CrawlError {
    /// Machine-readable kind used in error summaries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::InvalidParams(_) => ErrorKind::Configuration,
            _ => ErrorKind::Fetch,
        }
    }
}

/// Why a raw listing did not make it into the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    MissingName,
    MissingBrand,
    InvalidPrice,
    MissingSource,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::MissingName => "missing_name",
            Rejection::MissingBrand => "missing_brand",
            Rejection::InvalidPrice => "invalid_price",
            Rejection::MissingSource => "missing_source",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item store failure. Recoverable; the batch continues.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store `{0}` is unavailable")]
    Unavailable(&'static str),
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Error taxonomy as reported in `ErrorSummary::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Fetch,
    Validation,
    Persistence,
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons_are_machine_readable() {
        assert_eq!(Rejection::InvalidPrice.to_string(), "invalid_price");
        let json = serde_json::to_string(&Rejection::MissingBrand).unwrap();
        assert_eq!(json, "\"missing_brand\"");
    }

    #[test]
    fn invalid_params_is_a_configuration_error() {
        assert_eq!(
            CrawlError::InvalidParams("x".into()).kind(),
            ErrorKind::Configuration
        );
        let e = CrawlError::Status {
            url: "http://x".into(),
            status: 503,
        };
        assert_eq!(e.kind(), ErrorKind::Fetch);
        assert!(e.to_string().contains("503"));
    }
}
