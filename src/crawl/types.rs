// src/crawl/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SourceConfig;
use crate::error::CrawlError;

/// Loosely typed fields extracted from one product card / feed item.
/// Consumed once by the normalizer; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub source_id: String,
    /// Placeholder generated by the test-mode fallback, not crawled.
    #[serde(default)]
    pub synthetic: bool,
    pub fields: Map<String, Value>,
}

impl RawListing {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            synthetic: false,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set only when the key is absent or blank.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        let blank = match self.fields.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => false,
        };
        if blank {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Well-known field keys produced by the built-in crawlers.
pub mod field {
    pub const NAME: &str = "name";
    pub const BRAND: &str = "brand";
    pub const PRICE: &str = "price";
    pub const ORIGIN: &str = "origin";
    pub const WEIGHT: &str = "weight";
    pub const ROAST: &str = "roast";
    pub const FLAVORS: &str = "flavors";
    pub const PROCESSING: &str = "processing";
    pub const VARIETY: &str = "variety";
    pub const DESCRIPTION: &str = "description";
    pub const IMAGES: &str = "images";
    pub const URL: &str = "url";
    pub const ACTIVE: &str = "active";
}

/// One crawler variant, selected by a source's type tag.
///
/// Implementations skip malformed items and only fail for source-level problems
/// (unreachable endpoint, non-2xx, unparsable document). Test mode bounds volume
/// but runs the same extraction path.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(
        &self,
        source: &SourceConfig,
        test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError>;

    fn kind(&self) -> &'static str;
}
