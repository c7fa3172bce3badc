// src/store/file.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{merge, natural_key, BeanStore, Persisted};
use crate::bean::CanonicalBean;
use crate::error::PersistError;

type Records = BTreeMap<String, CanonicalBean>;

/// Single JSON document keyed by natural key.
///
/// Writes go to a sibling temp file and are renamed into place. The async mutex
/// serializes upserts from concurrently running sources.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Option<Records>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(None),
        }
    }

    async fn read_records(path: &Path) -> Result<Records, PersistError> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) if s.trim().is_empty() => Ok(Records::new()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Records::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_records(&self, records: &Records) -> Result<(), PersistError> {
        let body = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// All stored records, loading from disk if needed.
    pub async fn records(&self) -> Result<Vec<CanonicalBean>, PersistError> {
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            *guard = Some(Self::read_records(&self.path).await?);
        }
        Ok(guard
            .as_ref()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BeanStore for JsonFileStore {
    async fn is_available(&self) -> bool {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    error = %e,
                    path = %parent.display(),
                    "store directory not writable"
                );
                return false;
            }
        }
        match self.records().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "store file unreadable");
                false
            }
        }
    }

    async fn upsert(&self, bean: &CanonicalBean) -> Result<Persisted, PersistError> {
        let key = natural_key(bean);
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            *guard = Some(Self::read_records(&self.path).await?);
        }
        let Some(records) = guard.as_mut() else {
            return Err(PersistError::Backend("store state not loaded".into()));
        };

        let previous = records.get(&key).cloned();
        let (merged, outcome) = merge(previous.as_ref(), bean.clone());
        records.insert(key.clone(), merged);

        if let Err(e) = self.write_records(records).await {
            // keep memory consistent with disk
            match previous {
                Some(p) => records.insert(key, p),
                None => records.remove(&key),
            };
            return Err(e);
        }
        Ok(Persisted { key, outcome })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
