// src/dedup.rs
//! Batch-scoped duplicate removal.
//!
//! Only the current batch is consulted. Repeats across runs are the store's job
//! (idempotent upsert by natural key).

use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::bean::CanonicalBean;

/// Case-folded, whitespace-collapsed key part.
fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic identity of a bean: hash of folded name + brand + origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_parts(name: &str, brand: &str, origin: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        for part in [name, brand, origin.unwrap_or_default()] {
            hasher.update(fold(part).as_bytes());
            // unit separator keeps ("ab","c") and ("a","bc") apart
            hasher.update([0x1f_u8]);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(32);
        for b in digest.iter().take(16) {
            let _ = write!(&mut out, "{:02x}", b);
        }
        Self(out)
    }

    pub fn of(bean: &CanonicalBean) -> Self {
        Self::from_parts(&bean.name, &bean.brand, bean.origin.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    /// Order-preserving subsequence of the input; first occurrence wins.
    pub kept: Vec<CanonicalBean>,
    pub dropped: usize,
}

pub fn deduplicate(beans: Vec<CanonicalBean>) -> Deduplicated {
    let mut seen: HashSet<Fingerprint> = HashSet::with_capacity(beans.len());
    let mut kept = Vec::with_capacity(beans.len());
    let mut dropped = 0usize;

    for bean in beans {
        if !seen.insert(Fingerprint::of(&bean)) {
            dropped += 1;
            continue;
        }
        kept.push(bean);
    }

    counter!("dedup_dropped_total").increment(dropped as u64);
    Deduplicated { kept, dropped }
}
