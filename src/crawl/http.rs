// src/crawl/http.rs
use anyhow::{Context, Result};
use metrics::counter;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::error::CrawlError;

/// Shared transport for all crawler variants.
///
/// Every request carries a bounded timeout so one stalled merchant cannot hold up
/// a multi-source run. `file://` URLs are read from disk, which lets fixtures go
/// through the exact same extraction path as live pages.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }

    pub async fn get_text(&self, url: &str) -> Result<String, CrawlError> {
        let parsed = Url::parse(url)
            .map_err(|e| CrawlError::InvalidParams(format!("url `{url}`: {e}")))?;

        if parsed.scheme() == "file" {
            let path = parsed.to_file_path().map_err(|_| CrawlError::Fetch {
                url: url.to_string(),
                reason: "not a local file path".to_string(),
            })?;
            return tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CrawlError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
        }

        let resp = match self.client.get(parsed).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, url, "http fetch failed");
                counter!("crawl_fetch_errors_total").increment(1);
                return Err(CrawlError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("crawl_fetch_errors_total").increment(1);
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| CrawlError::Fetch {
            url: url.to_string(),
            reason: format!("reading body: {e}"),
        })
    }
}

/// Resolve `href` against `base`; absolute hrefs pass through.
pub fn resolve_url(base: Option<&str>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(abs) = Url::parse(href) {
        return Some(abs.to_string());
    }
    let base = Url::parse(base?).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}
