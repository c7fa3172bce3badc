// src/pipeline/mod.rs
//! Orchestrator: drives each selected source through
//! resolve → crawl → normalize → dedup → persist and collects one report per source.
//!
//! Sources run as independent tasks bounded by a semaphore. The only state shared
//! between them is the result collector, written once per source. A run-level
//! timeout or cancellation keeps everything already collected; sources still in
//! flight are reported `Failed` with a timeout cause.

pub mod sample;

use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::bean::CanonicalBean;
use crate::config::RunSettings;
use crate::dedup::{deduplicate, Deduplicated};
use crate::error::ErrorKind;
use crate::normalize::normalize;
use crate::notify::NotifierMux;
use crate::registry::SourceRegistry;
use crate::report::{RunReport, SourceReport, SourceStage};
use crate::store::{natural_key, BeanStore};
use crate::telemetry::ensure_metrics_described;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    One(String),
    AllActive,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub test_mode: bool,
    pub notify: bool,
    pub concurrency: usize,
    pub source_timeout: Duration,
    pub run_timeout: Option<Duration>,
    pub synthetic_batch_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&RunSettings::default())
    }
}

impl RunOptions {
    pub fn from_settings(run: &RunSettings) -> Self {
        Self {
            dry_run: false,
            test_mode: false,
            notify: false,
            concurrency: run.concurrency.max(1),
            source_timeout: run.source_timeout(),
            run_timeout: run.run_timeout(),
            synthetic_batch_size: run.synthetic_batch_size,
        }
    }
}

/// Report plus every bean that survived dedup, across all sources in selection order.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub beans: Vec<CanonicalBean>,
}

struct SourceOutcome {
    report: SourceReport,
    beans: Vec<CanonicalBean>,
}

impl SourceOutcome {
    fn failed(report: SourceReport) -> Self {
        Self {
            report,
            beans: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn BeanStore>,
    notifier: NotifierMux,
    opts: Arc<RunOptions>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<dyn BeanStore>,
        notifier: NotifierMux,
        opts: RunOptions,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
            opts: Arc::new(opts),
        }
    }

    pub async fn run(&self, selection: Selection, cancel: CancellationToken) -> RunOutcome {
        ensure_metrics_described();
        let started = Instant::now();

        let ids = match selection {
            Selection::One(id) => vec![id],
            Selection::AllActive => self.registry.list_active(),
        };

        // Store availability is decided once; dry runs never touch the store.
        let store_available = if self.opts.dry_run {
            false
        } else {
            let ok = self.store.is_available().await;
            if !ok {
                tracing::warn!(
                    target: "pipeline",
                    store = self.store.name(),
                    "store unavailable; running in local-artifact-only mode"
                );
            }
            ok
        };
        let persist = !self.opts.dry_run && store_available;

        tracing::info!(
            target: "pipeline",
            sources = ids.len(),
            dry_run = self.opts.dry_run,
            test_mode = self.opts.test_mode,
            persist,
            "run started"
        );

        let collector: Arc<Mutex<Vec<Option<SourceOutcome>>>> =
            Arc::new(Mutex::new((0..ids.len()).map(|_| None).collect()));
        let permits = Arc::new(Semaphore::new(self.opts.concurrency.max(1)));
        let mut stages = Vec::with_capacity(ids.len());
        let mut tasks = JoinSet::new();

        for (idx, id) in ids.iter().cloned().enumerate() {
            let (stage_tx, stage_rx) = watch::channel(SourceStage::Resolving);
            stages.push(stage_rx);

            let this = self.clone();
            let permits = permits.clone();
            let collector = collector.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let outcome = this.run_source_bounded(&id, persist, &stage_tx).await;
                collector.lock().await[idx] = Some(outcome);
            });
        }

        let drain = async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    tracing::error!(target: "pipeline", error = %e, "source task panicked");
                }
            }
        };
        let deadline = async {
            match self.opts.run_timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let abandon_cause = tokio::select! {
            _ = drain => None,
            _ = cancel.cancelled() => Some("run interrupted before source finished"),
            _ = deadline => Some("run timed out before source finished"),
        };
        if let Some(cause) = abandon_cause {
            tracing::warn!(target: "pipeline", cause, "abandoning unfinished sources");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let slots = std::mem::take(&mut *collector.lock().await);
        let mut reports = Vec::with_capacity(ids.len());
        let mut beans = Vec::new();
        for ((id, slot), stage) in ids.iter().zip(slots).zip(stages) {
            match slot {
                Some(outcome) => {
                    beans.extend(outcome.beans);
                    reports.push(outcome.report);
                }
                None => {
                    let label = self.label_for(id);
                    let stage = *stage.borrow();
                    let cause = abandon_cause.unwrap_or("source did not finish");
                    counter!("crawl_source_errors_total").increment(1);
                    reports.push(SourceReport::new(id.as_str(), label).fail(
                        stage,
                        ErrorKind::Timeout,
                        cause,
                        started.elapsed(),
                    ));
                }
            }
        }

        if self.opts.notify {
            for r in &reports {
                self.notify(r).await;
            }
        }

        let report = RunReport::assemble(
            reports,
            self.opts.dry_run,
            self.opts.test_mode,
            store_available,
            started.elapsed(),
        );
        tracing::info!(
            target: "pipeline",
            sources = report.summary.sources,
            completed = report.summary.completed,
            with_errors = report.summary.completed_with_errors,
            failed = report.summary.failed,
            persisted = report.summary.persisted,
            elapsed_ms = report.summary.elapsed_ms,
            "run finished"
        );
        RunOutcome { report, beans }
    }

    fn label_for(&self, id: &str) -> String {
        self.registry
            .get(id)
            .map(|s| s.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    async fn notify(&self, r: &SourceReport) {
        if r.status.succeeded() {
            let count = if r.persistence_skipped {
                r.normalized - r.deduplicated
            } else {
                r.persisted
            };
            self.notifier
                .notify_success(&r.source_id, &r.label, count, r.elapsed_secs())
                .await;
        } else {
            let cause = r
                .errors
                .last()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown failure");
            self.notifier
                .notify_failure(&r.source_id, &r.label, cause)
                .await;
        }
    }

    async fn run_source_bounded(
        &self,
        source_id: &str,
        persist: bool,
        stage: &watch::Sender<SourceStage>,
    ) -> SourceOutcome {
        let started = Instant::now();
        let limit = self.opts.source_timeout;
        let run = self.run_source(source_id, persist, stage);
        let outcome = match tokio::time::timeout(limit, run).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let at = *stage.borrow();
                tracing::warn!(
                    target: "pipeline",
                    source = source_id,
                    stage = ?at,
                    "source timed out"
                );
                counter!("crawl_source_errors_total").increment(1);
                let report = SourceReport::new(source_id, self.label_for(source_id)).fail(
                    at,
                    ErrorKind::Timeout,
                    format!("source timed out after {}s", limit.as_secs_f64()),
                    started.elapsed(),
                );
                SourceOutcome::failed(report)
            }
        };
        histogram!("source_elapsed_ms").record(outcome.report.elapsed_ms as f64);
        outcome
    }

    async fn run_source(
        &self,
        source_id: &str,
        persist: bool,
        stage: &watch::Sender<SourceStage>,
    ) -> SourceOutcome {
        let started = Instant::now();

        tracing::debug!(target: "pipeline", source = source_id, "resolving");
        let (cfg, crawler) = match self.registry.resolve(source_id) {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(
                    target: "pipeline",
                    source = source_id,
                    error = %e,
                    "resolve failed"
                );
                counter!("crawl_source_errors_total").increment(1);
                return SourceOutcome::failed(
                    SourceReport::new(source_id, self.label_for(source_id)).fail(
                        SourceStage::Resolving,
                        ErrorKind::Configuration,
                        e.to_string(),
                        started.elapsed(),
                    ),
                );
            }
        };
        let mut report = SourceReport::new(cfg.id.as_str(), cfg.label.as_str());

        stage.send_replace(SourceStage::Crawling);
        tracing::info!(
            target: "pipeline",
            source = source_id,
            crawler = crawler.kind(),
            "crawling"
        );
        let mut listings = match crawler.crawl(&cfg, self.opts.test_mode).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(target: "pipeline", source = source_id, error = %e, "crawl failed");
                counter!("crawl_source_errors_total").increment(1);
                return SourceOutcome::failed(report.fail(
                    SourceStage::Crawling,
                    e.kind(),
                    e.to_string(),
                    started.elapsed(),
                ));
            }
        };
        if listings.is_empty() && self.opts.test_mode {
            listings = sample::synthetic_listings(&cfg, self.opts.synthetic_batch_size);
            report.synthetic = true;
            tracing::warn!(
                target: "pipeline",
                source = source_id,
                count = listings.len(),
                "crawl returned nothing in test mode; using SYNTHETIC placeholder listings"
            );
        }
        report.crawled = listings.len();

        stage.send_replace(SourceStage::Normalizing);
        let stamped_at = Utc::now();
        let mut beans = Vec::with_capacity(listings.len());
        for listing in &listings {
            match normalize(listing, stamped_at) {
                Ok(bean) => beans.push(bean),
                Err(reason) => {
                    tracing::debug!(
                        target: "pipeline",
                        source = source_id,
                        %reason,
                        "listing rejected"
                    );
                    counter!("normalize_rejected_total", "reason" => reason.as_str()).increment(1);
                    report.record_rejection(reason);
                }
            }
        }
        drop(listings);
        report.normalized = beans.len();

        stage.send_replace(SourceStage::Deduplicating);
        let Deduplicated { kept, dropped } = deduplicate(beans);
        report.deduplicated = dropped;
        tracing::info!(
            target: "pipeline",
            source = source_id,
            crawled = report.crawled,
            normalized = report.normalized,
            rejected = report.rejected,
            deduplicated = dropped,
            "batch prepared"
        );

        if persist {
            stage.send_replace(SourceStage::Persisting);
            for bean in &kept {
                match self.store.upsert(bean).await {
                    Ok(p) => {
                        report.persisted += 1;
                        counter!("persist_ok_total").increment(1);
                        tracing::trace!(
                            target: "pipeline",
                            key = %p.key,
                            outcome = ?p.outcome,
                            "upserted"
                        );
                    }
                    Err(e) => {
                        counter!("persist_errors_total").increment(1);
                        tracing::warn!(
                            target: "pipeline",
                            source = source_id,
                            error = %e,
                            "upsert failed"
                        );
                        report.record_error(
                            SourceStage::Persisting,
                            ErrorKind::Persistence,
                            format!("{}: {e}", natural_key(bean)),
                        );
                    }
                }
            }
        } else {
            report.persistence_skipped = true;
            tracing::info!(target: "pipeline", source = source_id, "persistence skipped");
        }

        let report = report.complete(started.elapsed());
        tracing::info!(
            target: "pipeline",
            source = source_id,
            status = ?report.status,
            persisted = report.persisted,
            elapsed_ms = report.elapsed_ms,
            "source finished"
        );
        SourceOutcome {
            report,
            beans: kept,
        }
    }
}
