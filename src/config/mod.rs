// src/config/mod.rs
//! Crawler configuration: run settings, store selection and the source mapping.
//!
//! Lookup order mirrors the rest of the tooling:
//! 1) `$CRAWLER_CONFIG_PATH` (must exist when set)
//! 2) `config/crawler.toml`
//! 3) `config/crawler.json`

pub mod source;

pub use source::SourceConfig;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "CRAWLER_CONFIG_PATH";
pub const ENV_STORE_DISABLED: &str = "BEAN_STORE_DISABLED";

fn default_concurrency() -> usize {
    1
}
fn default_source_timeout_secs() -> u64 {
    300
}
fn default_http_timeout_secs() -> u64 {
    20
}
fn default_sample_size() -> usize {
    5
}
fn default_user_agent() -> String {
    concat!("bean-crawler/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/bean_store.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Upper bound on listings per source in test mode.
    #[serde(default = "default_sample_size")]
    pub test_sample_size: usize,
    /// Size of the placeholder batch used when a test-mode crawl comes back empty.
    #[serde(default = "default_sample_size")]
    pub synthetic_batch_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            source_timeout_secs: default_source_timeout_secs(),
            run_timeout_secs: None,
            http_timeout_secs: default_http_timeout_secs(),
            test_sample_size: default_sample_size(),
            synthetic_batch_size: default_sample_size(),
            user_agent: default_user_agent(),
        }
    }
}

impl RunSettings {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

/// Fully loaded configuration. `sources` keeps the file's insertion order.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub run: RunSettings,
    pub store: StoreSettings,
    pub sources: Vec<SourceConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    run: RunSettings,
    #[serde(default)]
    store: StoreSettings,
    #[serde(default)]
    sources: serde_json::Map<String, serde_json::Value>,
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading crawler config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse(&content, ext.as_str())
        .with_context(|| format!("parsing crawler config {}", path.display()))?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load configuration using env var + fallbacks.
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in ["config/crawler.toml", "config/crawler.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    Err(anyhow!(
        "no crawler config found (set {ENV_CONFIG_PATH} or create config/crawler.toml)"
    ))
}

/// Parse a config document. `hint_ext` picks the format; unknown hints try JSON then TOML.
pub fn parse(s: &str, hint_ext: &str) -> Result<AppConfig> {
    let value = match hint_ext {
        "toml" => toml_to_json(s)?,
        "json" => serde_json::from_str(s).context("invalid JSON")?,
        _ => match serde_json::from_str(s) {
            Ok(v) => v,
            Err(_) => toml_to_json(s)?,
        },
    };
    from_value(value)
}

fn toml_to_json(s: &str) -> Result<serde_json::Value> {
    let table: toml::Table = toml::from_str(s).context("invalid TOML")?;
    serde_json::to_value(table).context("converting TOML document")
}

fn from_value(value: serde_json::Value) -> Result<AppConfig> {
    let raw: RawConfig = serde_json::from_value(value).context("config schema")?;
    if raw.run.concurrency == 0 {
        bail!("run.concurrency must be at least 1");
    }

    let mut sources = Vec::with_capacity(raw.sources.len());
    for (id, body) in raw.sources {
        let id = id.trim().to_string();
        if id.is_empty() {
            bail!("sources: empty source identifier");
        }
        let mut sc: SourceConfig = serde_json::from_value(body)
            .with_context(|| format!("sources.{id}: invalid source table"))?;
        if sc.label.trim().is_empty() {
            sc.label = id.clone();
        }
        sc.kind = sc.kind.trim().to_string();
        sc.id = id;
        sources.push(sc);
    }

    Ok(AppConfig {
        run: raw.run,
        store: raw.store,
        sources,
    })
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    let disabled = std::env::var(ENV_STORE_DISABLED)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if disabled {
        tracing::info!("{ENV_STORE_DISABLED} set; persistence disabled for this run");
        cfg.store.kind = StoreKind::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[run]
concurrency = 3

[store]
kind = "memory"

[sources.zeta]
label = "Zeta Roasters"
type = "html"
active = true
url = "https://zeta.example/beans"

[sources.alpha]
type = "feed"
active = false

[sources.mid]
label = "  "
type = " Shopify "
active = true
"#;

    #[test]
    fn toml_keeps_source_order_and_defaults() {
        let cfg = parse(TOML, "toml").unwrap();
        let ids: Vec<_> = cfg.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(cfg.run.concurrency, 3);
        assert_eq!(cfg.run.test_sample_size, 5);
        assert_eq!(cfg.store.kind, StoreKind::Memory);
        assert_eq!(cfg.sources[1].label, "alpha");
        assert_eq!(cfg.sources[2].label, "mid");
        assert_eq!(cfg.sources[2].kind, "Shopify");
    }

    #[test]
    fn json_without_hint_is_detected() {
        let json = r#"{"sources": {"b": {"type": "feed", "active": true}, "a": {"type": "html"}}}"#;
        let cfg = parse(json, "").unwrap();
        assert_eq!(cfg.sources[0].id, "b");
        assert_eq!(cfg.sources[1].id, "a");
        assert!(!cfg.sources[1].active);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = parse("[run]\nconcurrency = 0\n", "toml").unwrap_err();
        assert!(format!("{err:#}").contains("concurrency"));
    }
}
