// src/lib.rs
// Public library surface for the CLI, integration tests and embedding.

pub mod artifact;
pub mod bean;
pub mod config;
pub mod crawl;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::bean::{CanonicalBean, RoastLevel};
pub use crate::config::{AppConfig, SourceConfig};
pub use crate::crawl::{Crawler, RawListing};
pub use crate::dedup::{deduplicate, Fingerprint};
pub use crate::error::{CrawlError, ErrorKind, PersistError, RegistryError, Rejection};
pub use crate::normalize::normalize;
pub use crate::notify::{NotificationEvent, NotifierMux};
pub use crate::pipeline::{Orchestrator, RunOptions, RunOutcome, Selection};
pub use crate::registry::{CrawlerRegistry, SourceRegistry};
pub use crate::report::{RunReport, SourceReport, SourceStage, SourceStatus};
pub use crate::store::{BeanStore, JsonFileStore, MemoryStore};
