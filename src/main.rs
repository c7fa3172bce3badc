//! bean-crawler: crawl one source or all active sources, normalize, deduplicate,
//! persist, and optionally write the aggregated batch to a JSON artifact.
//!
//! Exit code 0 when at least one source completed, 1 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tokio_util::sync::CancellationToken;

use bean_crawler::config::{self, AppConfig};
use bean_crawler::crawl::http::HttpFetcher;
use bean_crawler::pipeline::{Orchestrator, RunOptions, Selection};
use bean_crawler::registry::{CrawlerRegistry, SourceRegistry};
use bean_crawler::{artifact, store, telemetry, NotifierMux};

#[derive(Parser, Debug)]
#[command(name = "bean-crawler", version, about = "Coffee bean crawl pipeline")]
#[command(group(ArgGroup::new("target").required(true).args(["source", "all"])))]
struct Args {
    /// Crawl a single source by id.
    #[arg(short, long)]
    source: Option<String>,

    /// Crawl every active source.
    #[arg(short, long)]
    all: bool,

    /// Crawl, normalize and dedup, but do not write to the store.
    #[arg(short, long)]
    dry_run: bool,

    /// Bounded sample per source; empty sources get synthetic placeholders.
    #[arg(short, long)]
    test: bool,

    /// Write the aggregated bean batch here (JSON).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the run report here (JSON).
    #[arg(long)]
    report: Option<PathBuf>,

    /// Send success/failure notifications to configured channels.
    #[arg(short, long)]
    notify: bool,

    /// -v debug, -vv trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// JSON log lines.
    #[arg(long)]
    log_json: bool,

    /// Configuration file (overrides CRAWLER_CONFIG_PATH).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sources processed at once.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    telemetry::init_tracing(args.verbose, args.quiet, args.log_json);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = ?e, "crawl run aborted");
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(p) => config::load_from(p),
        None => config::load_default(),
    }
}

async fn run(args: Args) -> Result<bool> {
    let cfg = load_config(args.config.as_ref()).context("loading crawler configuration")?;

    let fetcher = HttpFetcher::new(cfg.run.http_timeout(), &cfg.run.user_agent)?;
    let crawlers = CrawlerRegistry::with_builtin(fetcher, cfg.run.test_sample_size);
    tracing::debug!(types = ?crawlers.tags(), "crawler types registered");
    let registry = SourceRegistry::new(cfg.sources.clone(), crawlers);
    for e in registry.unresolved() {
        tracing::warn!(error = %e, "source will fail at resolve");
    }

    let mut opts = RunOptions::from_settings(&cfg.run);
    opts.dry_run = args.dry_run;
    opts.test_mode = args.test;
    opts.notify = args.notify;
    if let Some(n) = args.concurrency {
        opts.concurrency = n.max(1);
    }

    let notifier = if args.notify {
        let mux = NotifierMux::from_env();
        if mux.is_empty() {
            tracing::info!("no notification channel configured; events are logged only");
        }
        mux
    } else {
        NotifierMux::default()
    };

    let selection = match args.source {
        Some(id) => Selection::One(id),
        None => Selection::AllActive,
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing with what is done");
                cancel.cancel();
            }
        });
    }

    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        store::build_store(&cfg.store),
        notifier,
        opts,
    );
    let outcome = orchestrator.run(selection, cancel).await;

    if let Some(path) = &args.output {
        artifact::write(path, &outcome.beans).await?;
        tracing::info!(path = %path.display(), beans = outcome.beans.len(), "artifact written");
    }
    if let Some(path) = &args.report {
        artifact::write_report(path, &outcome.report).await?;
        tracing::info!(path = %path.display(), "run report written");
    }

    let s = &outcome.report.summary;
    tracing::info!(
        sources = s.sources,
        completed = s.completed,
        with_errors = s.completed_with_errors,
        failed = s.failed,
        crawled = s.crawled,
        normalized = s.normalized,
        rejected = s.rejected,
        deduplicated = s.deduplicated,
        persisted = s.persisted,
        elapsed_ms = s.elapsed_ms,
        "summary"
    );

    Ok(outcome.report.success())
}
