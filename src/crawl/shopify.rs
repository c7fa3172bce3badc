// src/crawl/shopify.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;

use super::http::HttpFetcher;
use super::types::{field, Crawler, RawListing};
use crate::config::SourceConfig;
use crate::error::CrawlError;

#[derive(Debug, Deserialize)]
struct ProductsPage {
    // Kept as raw values so one malformed product cannot sink the page.
    #[serde(default)]
    products: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Product {
    title: Option<String>,
    handle: Option<String>,
    vendor: Option<String>,
    body_html: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    variants: Vec<Variant>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    price: Option<Value>,
    grams: Option<u64>,
    available: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Image {
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShopifyParams {
    shop_url: String,
    #[serde(default)]
    products_path: Option<String>,
}

impl ShopifyParams {
    fn endpoint(&self) -> String {
        let base = self.shop_url.trim_end_matches('/');
        let path = self.products_path.as_deref().unwrap_or("/products.json");
        format!("{base}{path}")
    }
}

/// Shopify storefront catalogue (`/products.json`).
pub struct ShopifyCrawler {
    fetcher: HttpFetcher,
    sample_size: usize,
}

impl ShopifyCrawler {
    pub fn new(fetcher: HttpFetcher, sample_size: usize) -> Self {
        Self {
            fetcher,
            sample_size,
        }
    }
}

#[async_trait]
impl Crawler for ShopifyCrawler {
    async fn crawl(
        &self,
        source: &SourceConfig,
        test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError> {
        let params: ShopifyParams = source.params_as()?;
        let url = params.endpoint();
        let body = self.fetcher.get_text(&url).await?;
        let limit = test_mode.then_some(self.sample_size);
        parse_products(&body, &url, &params.shop_url, source, limit)
    }

    fn kind(&self) -> &'static str {
        "shopify"
    }
}

pub fn parse_products(
    body: &str,
    url: &str,
    shop_url: &str,
    source: &SourceConfig,
    limit: Option<usize>,
) -> Result<Vec<RawListing>, CrawlError> {
    let t0 = std::time::Instant::now();
    let page: ProductsPage = serde_json::from_str(body).map_err(|e| CrawlError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let shop = shop_url.trim_end_matches('/');
    let mut out = Vec::new();
    for raw in page.products {
        if limit.is_some_and(|n| out.len() >= n) {
            break;
        }
        let product: Product = match serde_json::from_value(raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(source = %source.id, error = %e, "skipping malformed product");
                continue;
            }
        };
        out.push(product_to_listing(product, shop, source));
    }

    histogram!("crawl_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("crawl_items_total").increment(out.len() as u64);
    Ok(out)
}

fn product_to_listing(p: Product, shop: &str, source: &SourceConfig) -> RawListing {
    let mut listing = RawListing::new(&source.id);
    if let Some(t) = p.title {
        listing.set(field::NAME, t);
    }
    if let Some(v) = p.vendor {
        listing.set(field::BRAND, v);
    }
    if let Some(d) = p.body_html {
        listing.set(field::DESCRIPTION, d);
    }
    if let Some(h) = p.handle {
        listing.set(field::URL, format!("{shop}/products/{h}"));
    }
    if let Some(v) = p.variants.first() {
        if let Some(price) = &v.price {
            listing.set(field::PRICE, price.clone());
        }
        if let Some(g) = v.grams.filter(|g| *g > 0) {
            listing.set(field::WEIGHT, format!("{g}g"));
        }
    }
    if !p.variants.is_empty() {
        let any_available = p.variants.iter().any(|v| v.available.unwrap_or(true));
        listing.set(field::ACTIVE, any_available);
    }
    let images: Vec<Value> = p
        .images
        .into_iter()
        .filter_map(|i| i.src)
        .map(Value::from)
        .collect();
    if !images.is_empty() {
        listing.set(field::IMAGES, images);
    }
    if !p.tags.is_empty() {
        listing.set(
            field::FLAVORS,
            p.tags.into_iter().map(Value::from).collect::<Vec<_>>(),
        );
    }
    listing.set_default(field::BRAND, source.default_brand());
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCTS: &str = r#"{
      "products": [
        {
          "title": "Guatemala Antigua",
          "handle": "guatemala-antigua",
          "vendor": "El Cafe",
          "body_html": "<p>Volcanic soil</p>",
          "tags": ["Spicy", "Dark chocolate"],
          "variants": [{"price": "22000.00", "grams": 250, "available": false}],
          "images": [{"src": "https://cdn.shop/1.jpg"}]
        },
        {"title": 42, "variants": "nope"},
        {"title": "Decaf Colombia", "variants": [{"price": "17000"}]}
      ]
    }"#;

    #[test]
    fn products_become_listings_and_bad_ones_are_skipped() {
        let src = SourceConfig::new("elcafe", "shopify").with_label("El Cafe Roasters");
        let out = parse_products(PRODUCTS, "u", "https://elcafe.example/", &src, None).unwrap();
        assert_eq!(out.len(), 2);

        let g = &out[0];
        assert_eq!(g.get("brand").unwrap(), "El Cafe");
        assert_eq!(g.get("price").unwrap(), "22000.00");
        assert_eq!(g.get("weight").unwrap(), "250g");
        assert_eq!(g.get("active").unwrap(), &Value::Bool(false));
        assert_eq!(
            g.get("url").unwrap(),
            "https://elcafe.example/products/guatemala-antigua"
        );

        assert_eq!(out[1].get("brand").unwrap(), "El Cafe Roasters");
    }

    #[test]
    fn endpoint_joins_shop_and_path() {
        let p = ShopifyParams {
            shop_url: "https://s.example/".into(),
            products_path: None,
        };
        assert_eq!(p.endpoint(), "https://s.example/products.json");
    }
}
