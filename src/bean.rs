// src/bean.rs
//! Canonical bean schema shared by the normalizer, dedup, store and artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed roast-level enumeration. `Unspecified` is explicit, never a dropped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoastLevel {
    Light,
    MediumLight,
    Medium,
    MediumDark,
    Dark,
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBean {
    pub name: String,
    pub brand: String,
    /// Whole currency units; no fractional part.
    pub price: u64,
    pub origin: Option<String>,
    pub weight_g: Option<u32>,
    pub roast_level: RoastLevel,
    /// Ordered as given by the source.
    pub flavors: Vec<String>,
    pub processing: Option<String>,
    pub variety: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub url: Option<String>,
    pub source_id: String,
    pub is_active: bool,
    /// Placeholder generated in test mode, never crawled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CanonicalBean {
    /// Same record, ignoring the two timestamps.
    pub fn same_content(&self, other: &CanonicalBean) -> bool {
        let mut a = self.clone();
        a.created_at = other.created_at;
        a.last_updated = other.last_updated;
        &a == other
    }
}
