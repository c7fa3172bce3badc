// src/crawl/feed.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::http::HttpFetcher;
use super::types::{field, Crawler, RawListing};
use crate::config::SourceConfig;
use crate::error::CrawlError;

#[derive(Debug, Deserialize)]
struct Rss {
    #[serde(rename = "channel")]
    _channel: Channel,
}

/// Only the document shape is checked here; items are decoded one at a time.
#[derive(Debug, Deserialize)]
struct Channel {}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    price: Option<String>,
    origin: Option<String>,
    roast: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedParams {
    url: String,
}

/// RSS 2.0 product feeds. Category elements are read as flavor notes.
pub struct FeedCrawler {
    fetcher: HttpFetcher,
    sample_size: usize,
}

impl FeedCrawler {
    pub fn new(fetcher: HttpFetcher, sample_size: usize) -> Self {
        Self {
            fetcher,
            sample_size,
        }
    }
}

#[async_trait]
impl Crawler for FeedCrawler {
    async fn crawl(
        &self,
        source: &SourceConfig,
        test_mode: bool,
    ) -> Result<Vec<RawListing>, CrawlError> {
        let params: FeedParams = source.params_as()?;
        let body = self.fetcher.get_text(&params.url).await?;
        let limit = test_mode.then_some(self.sample_size);
        parse_feed(&body, &params.url, source, limit)
    }

    fn kind(&self) -> &'static str {
        "feed"
    }
}

/// Price mentioned inside a description: currency-prefixed or won-suffixed only,
/// so weights such as "250g" are never mistaken for prices.
fn price_in_text(text: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(?:[₩$€£]\s*\d[\d,]*(?:\.\d+)?|\d[\d,]*(?:\.\d+)?\s*(?:원|krw))")
            .expect("price regex")
    });
    re.find(text).map(|m| m.as_str().to_string())
}

pub fn parse_feed(
    xml: &str,
    url: &str,
    source: &SourceConfig,
    limit: Option<usize>,
) -> Result<Vec<RawListing>, CrawlError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let parse_err = |reason: String| CrawlError::Parse {
        url: url.to_string(),
        reason,
    };
    from_str::<Rss>(&xml_clean).map_err(|e| parse_err(e.to_string()))?;
    let fragments = item_fragments(&xml_clean).map_err(|e| parse_err(e.to_string()))?;

    let mut out = Vec::with_capacity(fragments.len());
    for (idx, frag) in fragments.into_iter().enumerate() {
        if limit.is_some_and(|n| out.len() >= n) {
            break;
        }
        let it: Item = match from_str(&format!("<item>{frag}</item>")) {
            Ok(it) => it,
            Err(e) => {
                tracing::debug!(
                    source = %source.id,
                    idx,
                    error = %e,
                    "skipping malformed feed item"
                );
                continue;
            }
        };

        let listing = item_listing(it, source);
        if listing.is_empty() {
            tracing::debug!(source = %source.id, idx, "skipping empty feed item");
            continue;
        }
        out.push(listing);
    }

    histogram!("crawl_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("crawl_items_total").increment(out.len() as u64);
    Ok(out)
}

/// Inner markup of every `rss > channel > item`, in document order.
fn item_fragments(xml: &str) -> Result<Vec<&str>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"item" && in_channel(&path) => {
                let span = reader.read_to_end(e.name())?;
                out.push(&xml[span.start as usize..span.end as usize]);
            }
            Event::Start(e) => path.push(e.local_name().as_ref().to_vec()),
            Event::Empty(e) if e.local_name().as_ref() == b"item" && in_channel(&path) => {
                out.push("");
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn in_channel(path: &[Vec<u8>]) -> bool {
    matches!(path, [rss, channel] if rss == b"rss" && channel == b"channel")
}

fn item_listing(it: Item, source: &SourceConfig) -> RawListing {
    let mut listing = RawListing::new(&source.id);
    if let Some(t) = it.title {
        listing.set(field::NAME, t);
    }
    if let Some(l) = it.link {
        listing.set(field::URL, l);
    }
    let price = it
        .price
        .or_else(|| it.description.as_deref().and_then(price_in_text));
    if let Some(p) = price {
        listing.set(field::PRICE, p);
    }
    if let Some(d) = it.description {
        listing.set(field::DESCRIPTION, d);
    }
    if let Some(o) = it.origin {
        listing.set(field::ORIGIN, o);
    }
    if let Some(r) = it.roast {
        listing.set(field::ROAST, r);
    }
    if !it.categories.is_empty() {
        let notes: Vec<Value> = it.categories.into_iter().map(Value::from).collect();
        listing.set(field::FLAVORS, notes);
    }
    if let Some(img) = it.enclosure.and_then(|e| e.url) {
        listing.set(field::IMAGES, vec![Value::from(img)]);
    }
    if !listing.is_empty() {
        listing.set_default(field::BRAND, source.default_brand());
    }
    listing
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Fritz beans</title>
    <item>
      <title>Kenya Nyeri AA</title>
      <link>https://fritz.example/p/1</link>
      <description>Juicy&nbsp;and bright. 200g ₩21,000</description>
      <category>Blackcurrant</category>
      <category>Grapefruit</category>
      <enclosure url="https://fritz.example/i/1.jpg" type="image/jpeg" length="0"/>
    </item>
    <item>
      <title>House Blend</title>
      <price>15000</price>
      <roast>Dark</roast>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn items_map_to_listings() {
        let src = SourceConfig::new("fritz", "feed").with_label("Fritz");
        let out = parse_feed(FEED, "file:///feed.xml", &src, None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("name").unwrap(), "Kenya Nyeri AA");
        assert_eq!(out[0].get("price").unwrap(), "₩21,000");
        assert_eq!(
            out[0].get("flavors").unwrap(),
            &serde_json::json!(["Blackcurrant", "Grapefruit"])
        );
        assert_eq!(
            out[0].get("images").unwrap(),
            &serde_json::json!(["https://fritz.example/i/1.jpg"])
        );
        assert_eq!(out[1].get("price").unwrap(), "15000");
        assert_eq!(out[1].get("roast").unwrap(), "Dark");
        assert_eq!(out[1].get("brand").unwrap(), "Fritz");
    }

    #[test]
    fn malformed_items_are_skipped() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>Kenya Nyeri</title><price>21000</price></item>
            <item><title>A</title><title>B</title><price>1</price></item>
            <item><title>C</title><price><b>15000</b></price></item>
            <item>
              <title>D</title>
              <enclosure url="https://x/1.jpg"/>
              <enclosure url="https://x/2.jpg"/>
            </item>
            <item><title>Guji</title><price>19000</price></item>
        </channel></rss>"#;
        let src = SourceConfig::new("fritz", "feed");
        let out = parse_feed(xml, "u", &src, None).unwrap();
        let names: Vec<_> = out.iter().map(|l| l.get("name").unwrap().clone()).collect();
        assert_eq!(names, ["Kenya Nyeri", "Guji"]);
    }

    #[test]
    fn limit_counts_kept_items_only() {
        let xml = r#"<rss><channel>
            <item><title>A</title><title>A</title></item>
            <item/>
            <item><title>B</title></item>
            <item><title>C</title></item>
        </channel></rss>"#;
        let src = SourceConfig::new("fritz", "feed");
        let out = parse_feed(xml, "u", &src, Some(1)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("name").unwrap(), "B");
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>none</title></channel></rss>"#;
        let src = SourceConfig::new("fritz", "feed");
        assert!(parse_feed(xml, "u", &src, None).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let src = SourceConfig::new("fritz", "feed");
        assert!(matches!(
            parse_feed("<html><body>nope", "u", &src, None),
            Err(CrawlError::Parse { .. })
        ));
    }

    #[test]
    fn weights_are_not_prices() {
        assert_eq!(price_in_text("200g bag"), None);
        assert_eq!(price_in_text("only 18,000원 today").as_deref(), Some("18,000원"));
    }
}
