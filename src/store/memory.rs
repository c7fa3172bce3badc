// src/store/memory.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{merge, natural_key, BeanStore, Persisted};
use crate::bean::CanonicalBean;
use crate::error::PersistError;

/// In-process store keyed by natural key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, CanonicalBean>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<CanonicalBean> {
        self.inner
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BeanStore for MemoryStore {
    async fn is_available(&self) -> bool {
        true
    }

    async fn upsert(&self, bean: &CanonicalBean) -> Result<Persisted, PersistError> {
        let key = natural_key(bean);
        let mut map = self
            .inner
            .lock()
            .map_err(|_| PersistError::Backend("memory store mutex poisoned".into()))?;
        let (merged, outcome) = merge(map.get(&key), bean.clone());
        map.insert(key.clone(), merged);
        Ok(Persisted { key, outcome })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
