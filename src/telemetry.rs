// src/telemetry.rs
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One-time metrics registration so the series exist before the first increment.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("crawl_items_total", "Raw listings returned by crawlers.");
        describe_counter!(
            "crawl_source_errors_total",
            "Sources that failed at resolve or crawl."
        );
        describe_counter!(
            "crawl_fetch_errors_total",
            "HTTP fetches that failed or returned non-2xx."
        );
        describe_counter!(
            "normalize_rejected_total",
            "Listings rejected by the normalizer, by reason."
        );
        describe_counter!(
            "dedup_dropped_total",
            "Beans dropped as in-batch duplicates."
        );
        describe_counter!("persist_ok_total", "Successful store upserts.");
        describe_counter!("persist_errors_total", "Failed store upserts.");
        describe_histogram!("crawl_parse_ms", "Page/feed extraction time in milliseconds.");
        describe_histogram!("source_elapsed_ms", "Wall time per source in milliseconds.");
    });
}

/// Default directive for a verbosity level; `RUST_LOG` overrides it.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init_tracing(verbose: u8, quiet: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true))
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
