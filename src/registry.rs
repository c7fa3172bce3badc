// src/registry.rs
//! Source lookup and crawler selection.
//!
//! Type tags are matched case-insensitively (trimmed, ASCII lowercase) on both
//! registration and lookup. There is no default crawler: an unregistered tag is a
//! hard failure for that source.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::crawl::feed::FeedCrawler;
use crate::crawl::html::HtmlCrawler;
use crate::crawl::http::HttpFetcher;
use crate::crawl::shopify::ShopifyCrawler;
use crate::crawl::Crawler;
use crate::error::RegistryError;

fn fold_tag(tag: &str) -> String {
    tag.trim().to_ascii_lowercase()
}

#[derive(Clone, Default)]
pub struct CrawlerRegistry {
    crawlers: HashMap<String, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `html`, `feed` and `shopify`, sharing one fetcher.
    pub fn with_builtin(fetcher: HttpFetcher, sample_size: usize) -> Self {
        let mut reg = Self::new();
        reg.register("html", Arc::new(HtmlCrawler::new(fetcher.clone(), sample_size)));
        reg.register("feed", Arc::new(FeedCrawler::new(fetcher.clone(), sample_size)));
        reg.register("shopify", Arc::new(ShopifyCrawler::new(fetcher, sample_size)));
        reg
    }

    /// Later registrations under the same tag replace earlier ones.
    pub fn register(&mut self, tag: &str, crawler: Arc<dyn Crawler>) {
        self.crawlers.insert(fold_tag(tag), crawler);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Crawler>> {
        self.crawlers.get(&fold_tag(tag)).cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut v: Vec<String> = self.crawlers.keys().cloned().collect();
        v.sort();
        v
    }
}

pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
    crawlers: CrawlerRegistry,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceConfig>, crawlers: CrawlerRegistry) -> Self {
        Self { sources, crawlers }
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    /// Source ids match exactly; type tags are case-folded.
    pub fn resolve(
        &self,
        source_id: &str,
    ) -> Result<(SourceConfig, Arc<dyn Crawler>), RegistryError> {
        let cfg = self
            .get(source_id)
            .ok_or_else(|| RegistryError::UnknownSource(source_id.to_string()))?;
        let crawler =
            self.crawlers
                .get(&cfg.kind)
                .ok_or_else(|| RegistryError::UnresolvedCrawlerType {
                    source_id: cfg.id.clone(),
                    tag: cfg.kind.clone(),
                })?;
        Ok((cfg.clone(), crawler))
    }

    /// Active source ids, in configuration order.
    pub fn list_active(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| s.active)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Startup check: every source whose type tag has no crawler.
    pub fn unresolved(&self) -> Vec<RegistryError> {
        self.sources
            .iter()
            .filter(|s| self.crawlers.get(&s.kind).is_none())
            .map(|s| RegistryError::UnresolvedCrawlerType {
                source_id: s.id.clone(),
                tag: s.kind.clone(),
            })
            .collect()
    }
}
