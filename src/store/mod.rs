// src/store/mod.rs
//! Persistence gateway. Every implementation upserts idempotently by natural key:
//! re-sending an unchanged bean never creates a second record, it only refreshes
//! `last_updated`.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bean::CanonicalBean;
use crate::config::{StoreKind, StoreSettings};
use crate::dedup::Fingerprint;
use crate::error::PersistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    /// Content changed; `created_at` kept from the stored record.
    Updated,
    /// Content unchanged; only `last_updated` moved.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    pub key: String,
    pub outcome: UpsertOutcome,
}

/// `{source_id}::{url}` when the listing has a URL, else `{source_id}::fp:{fingerprint}`.
pub fn natural_key(bean: &CanonicalBean) -> String {
    match bean.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => format!("{}::{}", bean.source_id, url),
        None => format!("{}::fp:{}", bean.source_id, Fingerprint::of(bean)),
    }
}

/// Merge `incoming` over an optional stored record under the upsert rules.
pub(crate) fn merge(
    stored: Option<&CanonicalBean>,
    mut incoming: CanonicalBean,
) -> (CanonicalBean, UpsertOutcome) {
    match stored {
        None => (incoming, UpsertOutcome::Created),
        Some(prev) => {
            let unchanged = prev.same_content(&incoming);
            incoming.created_at = prev.created_at;
            let outcome = if unchanged {
                UpsertOutcome::Refreshed
            } else {
                UpsertOutcome::Updated
            };
            (incoming, outcome)
        }
    }
}

#[async_trait]
pub trait BeanStore: Send + Sync {
    /// Checked once per run before any write.
    async fn is_available(&self) -> bool;

    async fn upsert(&self, bean: &CanonicalBean) -> Result<Persisted, PersistError>;

    fn name(&self) -> &'static str;
}

/// Store that never accepts writes; selects store-disabled mode.
pub struct DisabledStore;

#[async_trait]
impl BeanStore for DisabledStore {
    async fn is_available(&self) -> bool {
        false
    }

    async fn upsert(&self, _bean: &CanonicalBean) -> Result<Persisted, PersistError> {
        Err(PersistError::Unavailable(self.name()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub fn build_store(settings: &StoreSettings) -> Arc<dyn BeanStore> {
    match settings.kind {
        StoreKind::File => Arc::new(JsonFileStore::new(settings.path.clone())),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Disabled => Arc::new(DisabledStore),
    }
}
