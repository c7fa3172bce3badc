// src/artifact.rs
//! Output artifact: the aggregated bean batch as a pretty-printed JSON array.
//! Timestamps are RFC 3339 / ISO-8601 strings.

use anyhow::{Context, Result};
use std::path::Path;

use crate::bean::CanonicalBean;
use crate::report::RunReport;

pub fn to_string(beans: &[CanonicalBean]) -> Result<String> {
    serde_json::to_string_pretty(beans).context("serializing bean artifact")
}

pub fn from_str(s: &str) -> Result<Vec<CanonicalBean>> {
    serde_json::from_str(s).context("parsing bean artifact")
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

pub async fn write(path: &Path, beans: &[CanonicalBean]) -> Result<()> {
    ensure_parent(path).await?;
    let body = to_string(beans)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing artifact {}", path.display()))?;
    Ok(())
}

pub async fn read(path: &Path) -> Result<Vec<CanonicalBean>> {
    let s = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading artifact {}", path.display()))?;
    from_str(&s)
}

pub async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    ensure_parent(path).await?;
    let body = serde_json::to_string_pretty(report).context("serializing run report")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing run report {}", path.display()))
}
