// src/report.rs
//! Per-source and per-run accounting.
//!
//! A `SourceReport` is built incrementally by the orchestrator while one source
//! moves through the pipeline. The `RunReport` is assembled once at the end and
//! never mutated after it is returned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ErrorKind, Rejection};

/// Pipeline stage a source is in (or failed in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStage {
    Resolving,
    Crawling,
    Normalizing,
    Deduplicating,
    Persisting,
}

/// Terminal state of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Completed,
    CompletedWithErrors,
    Failed,
}

impl SourceStatus {
    pub fn succeeded(&self) -> bool {
        !matches!(self, SourceStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub stage: SourceStage,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_id: String,
    pub label: String,
    pub status: SourceStatus,
    pub crawled: usize,
    pub normalized: usize,
    pub rejected: usize,
    pub deduplicated: usize,
    pub persisted: usize,
    /// The crawl came back empty in test mode and a placeholder batch was used.
    pub synthetic: bool,
    /// Persistence was skipped (dry-run or store unavailable).
    pub persistence_skipped: bool,
    pub elapsed_ms: u64,
    pub rejections: BTreeMap<Rejection, usize>,
    pub errors: Vec<ErrorSummary>,
}

impl SourceReport {
    pub fn new(source_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            label: label.into(),
            status: SourceStatus::Failed,
            crawled: 0,
            normalized: 0,
            rejected: 0,
            deduplicated: 0,
            persisted: 0,
            synthetic: false,
            persistence_skipped: false,
            elapsed_ms: 0,
            rejections: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_rejection(&mut self, reason: Rejection) {
        self.rejected += 1;
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    pub fn record_error(
        &mut self,
        stage: SourceStage,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(ErrorSummary {
            stage,
            kind,
            message: message.into(),
        });
    }

    /// Source-level failure: terminal `Failed`.
    pub fn fail(
        mut self,
        stage: SourceStage,
        kind: ErrorKind,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        self.record_error(stage, kind, message);
        self.status = SourceStatus::Failed;
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    /// Pipeline ran to the end; item-level problems downgrade to `CompletedWithErrors`.
    pub fn complete(mut self, elapsed: Duration) -> Self {
        self.status = if self.rejected == 0 && self.errors.is_empty() {
            SourceStatus::Completed
        } else {
            SourceStatus::CompletedWithErrors
        };
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1_000.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources: usize,
    pub completed: usize,
    pub completed_with_errors: usize,
    pub failed: usize,
    pub crawled: usize,
    pub normalized: usize,
    pub rejected: usize,
    pub deduplicated: usize,
    pub persisted: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub test_mode: bool,
    pub store_available: bool,
    pub sources: Vec<SourceReport>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Sums the per-source counts as recorded; nothing is re-derived.
    pub fn assemble(
        sources: Vec<SourceReport>,
        dry_run: bool,
        test_mode: bool,
        store_available: bool,
        elapsed: Duration,
    ) -> Self {
        let mut summary = RunSummary {
            sources: sources.len(),
            elapsed_ms: elapsed.as_millis() as u64,
            ..RunSummary::default()
        };
        for s in &sources {
            match s.status {
                SourceStatus::Completed => summary.completed += 1,
                SourceStatus::CompletedWithErrors => summary.completed_with_errors += 1,
                SourceStatus::Failed => summary.failed += 1,
            }
            summary.crawled += s.crawled;
            summary.normalized += s.normalized;
            summary.rejected += s.rejected;
            summary.deduplicated += s.deduplicated;
            summary.persisted += s.persisted;
        }
        Self {
            dry_run,
            test_mode,
            store_available,
            sources,
            summary,
        }
    }

    /// True when at least one source reached `Completed` or `CompletedWithErrors`.
    pub fn success(&self) -> bool {
        self.sources.iter().any(|s| s.status.succeeded())
    }

    pub fn source(&self, id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source_id == id)
    }
}
