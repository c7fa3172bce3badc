// src/config/source.rs
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CrawlError;

/// One configured merchant source. Immutable for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key; taken from the mapping key, not the table body.
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Crawler type tag (`html`, `feed`, `shopify`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub active: bool,
    /// Everything else: endpoint, selectors, brand override. Opaque to the orchestrator.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind: kind.into(),
            active: true,
            params: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Brand stamped on listings whose page does not name one.
    pub fn default_brand(&self) -> &str {
        self.param_str("brand").unwrap_or(self.label.as_str())
    }

    /// Deserialize the type-specific parameters into a crawler's own struct.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, CrawlError> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            CrawlError::InvalidParams(format!("source `{}`: {e}", self.id))
        })
    }
}
