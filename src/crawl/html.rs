// src/crawl/html.rs
//! Selector-driven product-card extraction for plain merchant pages.

use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::http::{resolve_url, HttpFetcher};
use super::types::{field, Crawler, RawListing};
use crate::config::SourceConfig;
use crate::error::CrawlError;

/// Type-specific parameters of an `html` source.
#[derive(Debug, Clone, Deserialize)]
pub struct HtmlParams {
    pub url: String,
    /// Selector matching one product card.
    pub item_selector: String,
    /// Field name -> selector, evaluated inside each card.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub image_selector: Option<String>,
    #[serde(default)]
    pub link_selector: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

pub struct HtmlCrawler {
    fetcher: HttpFetcher,
    sample_size: usize,
}

impl HtmlCrawler {
    pub fn new(fetcher: HttpFetcher, sample_size: usize) -> Self {
        Self {
            fetcher,
            sample_size,
        }
    }
}

#[async_trait]
impl Crawler for HtmlCrawler {
    async fn crawl(
        &self,
        source: &SourceConfig,
        test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError> {
        let params: HtmlParams = source.params_as()?;
        let body = self.fetcher.get_text(&params.url).await?;
        let limit = test_mode.then_some(self.sample_size);
        extract_listings(&body, source, &params, limit)
    }

    fn kind(&self) -> &'static str {
        "html"
    }
}

fn selector(s: &str) -> Result<Selector, CrawlError> {
    Selector::parse(s).map_err(|e| CrawlError::InvalidParams(format!("selector `{s}`: {e}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Extract one listing per card. Cards that yield nothing are skipped.
pub fn extract_listings(
    body: &str,
    source: &SourceConfig,
    params: &HtmlParams,
    limit: Option<usize>,
) -> Result<Vec<RawListing>, CrawlError> {
    let t0 = std::time::Instant::now();

    let item_sel = selector(&params.item_selector)?;
    let field_sels = params
        .fields
        .iter()
        .map(|(name, s)| selector(s).map(|sel| (name.as_str(), sel)))
        .collect::<Result<Vec<_>, _>>()?;
    let image_sel = params.image_selector.as_deref().map(selector).transpose()?;
    let link_sel = params.link_selector.as_deref().map(selector).transpose()?;
    let base = params.base_url.as_deref().unwrap_or(params.url.as_str());

    let doc = Html::parse_document(body);
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for card in doc.select(&item_sel) {
        if limit.is_some_and(|n| out.len() >= n) {
            break;
        }

        let mut listing = RawListing::new(&source.id);
        for (name, sel) in &field_sels {
            if *name == field::FLAVORS {
                let notes: Vec<Value> = card
                    .select(sel)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .map(Value::from)
                    .collect();
                if !notes.is_empty() {
                    listing.set(name, notes);
                }
                continue;
            }
            if let Some(text) = card.select(sel).map(element_text).find(|t| !t.is_empty()) {
                listing.set(name, text);
            }
        }

        if let Some(sel) = &image_sel {
            let images: Vec<Value> = card
                .select(sel)
                .filter_map(|img| {
                    let v = img.value();
                    v.attr("src").or_else(|| v.attr("data-src"))
                })
                .filter_map(|src| resolve_url(Some(base), src))
                .map(Value::from)
                .collect();
            if !images.is_empty() {
                listing.set(field::IMAGES, images);
            }
        }

        if let Some(sel) = &link_sel {
            let href = card
                .select(sel)
                .find_map(|a| a.value().attr("href"))
                .and_then(|h| resolve_url(Some(base), h));
            if let Some(h) = href {
                listing.set(field::URL, h);
            }
        }

        if listing.is_empty() {
            skipped += 1;
            tracing::debug!(
                source = %source.id,
                "skipping product card with no extractable fields"
            );
            continue;
        }
        listing.set_default(field::BRAND, source.default_brand());
        out.push(listing);
    }

    if skipped > 0 {
        tracing::info!(source = %source.id, skipped, "skipped malformed product cards");
    }
    histogram!("crawl_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("crawl_items_total").increment(out.len() as u64);
    Ok(out)
}
