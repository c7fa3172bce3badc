// tests/pipeline_scenarios.rs
// Orchestrator end to end with scripted crawlers and in-memory stores.
use async_trait::async_trait;
use bean_crawler::bean::CanonicalBean;
use bean_crawler::crawl::{Crawler, RawListing};
use bean_crawler::error::{CrawlError, ErrorKind, PersistError, Rejection};
use bean_crawler::notify::{NotificationEvent, Notifier, NotifierMux};
use bean_crawler::pipeline::{Orchestrator, RunOptions, Selection};
use bean_crawler::registry::{CrawlerRegistry, SourceRegistry};
use bean_crawler::report::{SourceStage, SourceStatus};
use bean_crawler::store::{BeanStore, DisabledStore, MemoryStore, Persisted};
use bean_crawler::{artifact, SourceConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returns the same listings for every source, optionally after a delay.
struct Scripted {
    listings: Vec<RawListing>,
    delay: Duration,
}

impl Scripted {
    fn new(listings: Vec<RawListing>) -> Arc<Self> {
        Arc::new(Self {
            listings,
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            listings: vec![],
            delay,
        })
    }
}

#[async_trait]
impl Crawler for Scripted {
    async fn crawl(
        &self,
        source: &SourceConfig,
        _test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .listings
            .iter()
            .cloned()
            .map(|mut l| {
                l.source_id = source.id.clone();
                l
            })
            .collect())
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }
}

struct Unreachable;

#[async_trait]
impl Crawler for Unreachable {
    async fn crawl(
        &self,
        source: &SourceConfig,
        _test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError> {
        Err(CrawlError::Status {
            url: format!("https://{}.example/beans", source.id),
            status: 503,
        })
    }

    fn kind(&self) -> &'static str {
        "unreachable"
    }
}

/// Accepts everything except beans whose name contains "Reject".
#[derive(Default)]
struct PickyStore {
    inner: MemoryStore,
}

#[async_trait]
impl BeanStore for PickyStore {
    async fn is_available(&self) -> bool {
        true
    }

    async fn upsert(&self, bean: &CanonicalBean) -> Result<Persisted, PersistError> {
        if bean.name.contains("Reject") {
            return Err(PersistError::Backend("write refused".into()));
        }
        self.inner.upsert(bean).await
    }

    fn name(&self) -> &'static str {
        "picky"
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<NotificationEvent>>);

#[async_trait]
impl Notifier for Recorder {
    async fn send(&self, ev: &NotificationEvent) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(ev.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn listing(name: &str, price: &str) -> RawListing {
    RawListing::new("placeholder")
        .with("name", name)
        .with("brand", "Center Coffee")
        .with("price", price)
        .with("origin", "Ethiopia")
}

fn yirgacheffe_pair() -> Vec<RawListing> {
    vec![
        listing("  Ethiopia Yirgacheffe  ", "18,000원"),
        listing("Ethiopia Yirgacheffe", "18,000원"),
    ]
}

fn orchestrator(
    sources: Vec<SourceConfig>,
    crawlers: CrawlerRegistry,
    store: Arc<dyn BeanStore>,
    opts: RunOptions,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(SourceRegistry::new(sources, crawlers)),
        store,
        NotifierMux::default(),
        opts,
    )
}

fn scripted_registry(listings: Vec<RawListing>) -> CrawlerRegistry {
    let mut reg = CrawlerRegistry::new();
    reg.register("html", Scripted::new(listings));
    reg
}

#[tokio::test]
async fn whitespace_variants_collapse_to_one_record() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(yirgacheffe_pair()),
        store.clone(),
        RunOptions::default(),
    );
    let out = orch
        .run(Selection::One("centercoffee".into()), CancellationToken::new())
        .await;

    let r = out.report.source("centercoffee").unwrap();
    assert_eq!(r.status, SourceStatus::Completed);
    assert_eq!((r.crawled, r.normalized, r.deduplicated, r.persisted), (2, 2, 1, 1));
    assert_eq!(out.beans.len(), 1);
    assert_eq!(out.beans[0].name, "Ethiopia Yirgacheffe");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn unparsable_price_is_rejected_before_persistence() {
    let store = Arc::new(MemoryStore::new());
    let mut listings = yirgacheffe_pair();
    listings.push(listing("Kenya Nyeri", "N/A"));
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(listings),
        store.clone(),
        RunOptions::default(),
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    let r = &out.report.sources[0];
    assert_eq!(r.status, SourceStatus::CompletedWithErrors);
    assert_eq!(r.rejected, 1);
    assert_eq!(r.rejections.get(&Rejection::InvalidPrice), Some(&1));
    assert!(store.snapshot().iter().all(|b| b.name != "Kenya Nyeri"));
    assert!(out.report.success());
}

#[tokio::test]
async fn unknown_type_tag_fails_only_that_source() {
    let sources = vec![
        SourceConfig::new("centercoffee", "html"),
        SourceConfig::new("fritz", "HTML"),
        SourceConfig::new("elcafe", "graphql"),
    ];
    let orch = orchestrator(
        sources,
        scripted_registry(yirgacheffe_pair()),
        Arc::new(MemoryStore::new()),
        RunOptions {
            concurrency: 3,
            ..RunOptions::default()
        },
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    let ids: Vec<_> = out.report.sources.iter().map(|s| s.source_id.as_str()).collect();
    assert_eq!(ids, ["centercoffee", "fritz", "elcafe"]);
    assert_eq!(out.report.summary.completed, 2);
    assert_eq!(out.report.summary.failed, 1);

    let failed = out.report.source("elcafe").unwrap();
    assert_eq!(failed.status, SourceStatus::Failed);
    assert_eq!(failed.errors[0].stage, SourceStage::Resolving);
    assert_eq!(failed.errors[0].kind, ErrorKind::Configuration);
    assert!(out.report.success());
}

#[tokio::test]
async fn unknown_source_id_fails_the_run() {
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(yirgacheffe_pair()),
        Arc::new(MemoryStore::new()),
        RunOptions::default(),
    );
    let out = orch
        .run(Selection::One("CenterCoffee".into()), CancellationToken::new())
        .await;
    assert_eq!(out.report.sources[0].status, SourceStatus::Failed);
    assert!(!out.report.success());
}

#[tokio::test]
async fn fetch_failure_is_terminal_for_the_source() {
    let mut reg = scripted_registry(yirgacheffe_pair());
    reg.register("feed", Arc::new(Unreachable));
    let orch = orchestrator(
        vec![
            SourceConfig::new("down", "feed"),
            SourceConfig::new("up", "html"),
        ],
        reg,
        Arc::new(MemoryStore::new()),
        RunOptions::default(),
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    let down = out.report.source("down").unwrap();
    assert_eq!(down.status, SourceStatus::Failed);
    assert_eq!(down.errors[0].stage, SourceStage::Crawling);
    assert_eq!(down.errors[0].kind, ErrorKind::Fetch);
    assert!(down.errors[0].message.contains("503"));
    assert_eq!(out.report.source("up").unwrap().status, SourceStatus::Completed);
    assert_eq!(out.beans.len(), 1);
}

#[tokio::test]
async fn unavailable_store_still_produces_the_batch() {
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(yirgacheffe_pair()),
        Arc::new(DisabledStore),
        RunOptions::default(),
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    assert!(!out.report.store_available);
    let r = &out.report.sources[0];
    assert_eq!(r.status, SourceStatus::Completed);
    assert_eq!((r.normalized, r.deduplicated, r.persisted), (2, 1, 0));
    assert!(r.persistence_skipped);
    assert_eq!(out.beans.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/beans.json");
    artifact::write(&path, &out.beans).await.unwrap();
    assert_eq!(artifact::read(&path).await.unwrap(), out.beans);
}

#[tokio::test]
async fn dry_run_never_writes() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(yirgacheffe_pair()),
        store.clone(),
        RunOptions {
            dry_run: true,
            ..RunOptions::default()
        },
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;
    assert!(out.report.dry_run);
    assert_eq!(out.report.summary.persisted, 0);
    assert!(store.is_empty());
    assert_eq!(out.beans.len(), 1);
}

#[tokio::test]
async fn per_item_persist_failure_does_not_abort_batch() {
    let store = Arc::new(PickyStore::default());
    let listings = vec![
        listing("Reject Me", "10000"),
        listing("Colombia Huila", "16500"),
    ];
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(listings),
        store.clone(),
        RunOptions::default(),
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    let r = &out.report.sources[0];
    assert_eq!(r.status, SourceStatus::CompletedWithErrors);
    assert_eq!(r.persisted, 1);
    assert_eq!(r.errors.len(), 1);
    assert_eq!(r.errors[0].stage, SourceStage::Persisting);
    assert_eq!(r.errors[0].kind, ErrorKind::Persistence);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn rerun_is_idempotent_against_the_store() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        vec![SourceConfig::new("centercoffee", "html")],
        scripted_registry(vec![
            listing("Ethiopia Yirgacheffe", "18000"),
            listing("Colombia Huila", "16500"),
        ]),
        store.clone(),
        RunOptions::default(),
    );
    orch.run(Selection::AllActive, CancellationToken::new()).await;
    let first = store.snapshot();
    orch.run(Selection::AllActive, CancellationToken::new()).await;
    let second = store.snapshot();

    assert_eq!(second.len(), 2);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.created_at, b.created_at);
        assert!(b.last_updated >= a.last_updated);
    }
}

#[tokio::test]
async fn empty_crawl_uses_synthetic_batch_only_in_test_mode() {
    let sources = vec![SourceConfig::new("elcafe", "html").with_label("El Cafe")];

    let store = Arc::new(MemoryStore::new());
    let test_orch = orchestrator(
        sources.clone(),
        scripted_registry(vec![]),
        store.clone(),
        RunOptions {
            test_mode: true,
            synthetic_batch_size: 5,
            ..RunOptions::default()
        },
    );
    let out = test_orch.run(Selection::AllActive, CancellationToken::new()).await;
    let r = &out.report.sources[0];
    assert!(r.synthetic);
    assert_eq!(r.crawled, 5);
    assert_eq!(out.beans.len(), 5);
    assert!(out
        .beans
        .iter()
        .all(|b| b.synthetic && b.source_id == "elcafe" && b.brand == "El Cafe"));

    // placeholders stay tagged once stored and written out
    let stored = store.snapshot();
    assert_eq!(stored.len(), 5);
    assert!(stored.iter().all(|b| b.synthetic));
    let doc: serde_json::Value =
        serde_json::from_str(&artifact::to_string(&out.beans).unwrap()).unwrap();
    assert!(doc
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["synthetic"] == serde_json::json!(true)));

    let prod_orch = orchestrator(
        sources,
        scripted_registry(vec![]),
        Arc::new(MemoryStore::new()),
        RunOptions::default(),
    );
    let out = prod_orch.run(Selection::AllActive, CancellationToken::new()).await;
    let r = &out.report.sources[0];
    assert!(!r.synthetic);
    assert_eq!(r.crawled, 0);
    assert_eq!(r.status, SourceStatus::Completed);
    assert!(out.beans.is_empty());
}

#[tokio::test]
async fn run_timeout_keeps_finished_sources() {
    let mut reg = scripted_registry(yirgacheffe_pair());
    reg.register("feed", Scripted::slow(Duration::from_secs(30)));
    let orch = orchestrator(
        vec![
            SourceConfig::new("fast", "html"),
            SourceConfig::new("stuck", "feed"),
        ],
        reg,
        Arc::new(MemoryStore::new()),
        RunOptions {
            concurrency: 2,
            run_timeout: Some(Duration::from_millis(300)),
            ..RunOptions::default()
        },
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    assert_eq!(out.report.source("fast").unwrap().status, SourceStatus::Completed);
    let stuck = out.report.source("stuck").unwrap();
    assert_eq!(stuck.status, SourceStatus::Failed);
    assert_eq!(stuck.errors[0].kind, ErrorKind::Timeout);
    assert_eq!(stuck.errors[0].stage, SourceStage::Crawling);
    assert!(out.report.success());
}

#[tokio::test]
async fn source_timeout_marks_only_the_slow_source() {
    let mut reg = scripted_registry(yirgacheffe_pair());
    reg.register("feed", Scripted::slow(Duration::from_secs(30)));
    let orch = orchestrator(
        vec![
            SourceConfig::new("stuck", "feed"),
            SourceConfig::new("fast", "html"),
        ],
        reg,
        Arc::new(MemoryStore::new()),
        RunOptions {
            source_timeout: Duration::from_millis(200),
            ..RunOptions::default()
        },
    );
    let out = orch.run(Selection::AllActive, CancellationToken::new()).await;

    let stuck = out.report.source("stuck").unwrap();
    assert_eq!(stuck.status, SourceStatus::Failed);
    assert_eq!(stuck.errors[0].kind, ErrorKind::Timeout);
    assert_eq!(out.report.source("fast").unwrap().status, SourceStatus::Completed);
}

#[tokio::test]
async fn cancellation_marks_unfinished_sources_failed() {
    let mut reg = CrawlerRegistry::new();
    reg.register("feed", Scripted::slow(Duration::from_secs(30)));
    let orch = orchestrator(
        vec![SourceConfig::new("stuck", "feed")],
        reg,
        Arc::new(MemoryStore::new()),
        RunOptions::default(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let out = orch.run(Selection::AllActive, cancel).await;

    assert_eq!(out.report.sources.len(), 1);
    assert_eq!(out.report.sources[0].errors[0].kind, ErrorKind::Timeout);
    assert!(!out.report.success());
}

#[tokio::test]
async fn notifications_follow_terminal_state() {
    let recorder = Arc::new(Recorder::default());
    let orch = Orchestrator::new(
        Arc::new(SourceRegistry::new(
            vec![
                SourceConfig::new("centercoffee", "html").with_label("Center Coffee"),
                SourceConfig::new("elcafe", "graphql").with_label("El Cafe"),
            ],
            scripted_registry(yirgacheffe_pair()),
        )),
        Arc::new(MemoryStore::new()),
        NotifierMux::new(vec![recorder.clone() as Arc<dyn Notifier>]),
        RunOptions {
            notify: true,
            ..RunOptions::default()
        },
    );
    orch.run(Selection::AllActive, CancellationToken::new()).await;

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        NotificationEvent::Success { source_id, item_count: 1, .. } if source_id == "centercoffee"
    ));
    assert!(matches!(
        &events[1],
        NotificationEvent::Failure { label, .. } if label == "El Cafe"
    ));
}
