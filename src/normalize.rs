// src/normalize.rs
//! Raw listing -> canonical bean.
//!
//! Pure: the same listing and stamp always produce the same bean or the same
//! rejection. Timestamps are supplied by the caller.

use chrono::{DateTime, Utc};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde_json::Value;

use crate::bean::{CanonicalBean, RoastLevel};
use crate::crawl::{field, RawListing};
use crate::error::Rejection;

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

fn value_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => clean_text(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Split list-ish values: arrays as-is, strings on `, / · |`. Order preserved.
fn value_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        Value::String(s) => clean_text(s)
            .split([',', '/', '·', '|'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// URL lists: arrays as-is, a single string is one URL.
fn value_urls(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

/// Price in whole currency units. `None` for missing, negative or non-numeric input.
pub fn parse_price(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => whole_units(n.as_f64()?),
        Value::String(s) => parse_price_str(s),
        _ => None,
    }
}

fn parse_price_str(s: &str) -> Option<u64> {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("price regex"));

    let s = clean_text(s);
    let m = re.find(&s)?;
    // Anything other than currency markers around the number means it's not a price.
    let rest: String = format!("{}{}", &s[..m.start()], &s[m.end()..])
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let rest = ["krw", "usd", "eur", "won", "원", "₩", "$", "€", "£"]
        .iter()
        .fold(rest, |acc, marker| acc.replace(marker, ""));
    if !rest.is_empty() {
        return None;
    }

    let digits = m.as_str().replace(',', "");
    whole_units(digits.parse().ok()?)
}

/// Rounded amount, or `None` when it is negative or does not fit in `u64`.
fn whole_units(f: f64) -> Option<u64> {
    let r = f.round();
    // `u64::MAX as f64` rounds up to 2^64, which no longer fits.
    (r.is_finite() && r >= 0.0 && r < u64::MAX as f64).then_some(r as u64)
}

/// Net weight in grams from `250g`, `1kg`, `1.5 kg`, `12oz`, `200그램` or a bare number.
pub fn parse_weight_grams(v: &Value) -> Option<u32> {
    static RE_W: OnceCell<Regex> = OnceCell::new();
    let re = RE_W.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(kg|킬로|grams|gram|gr|g|그램|oz|lbs|lb)?")
            .expect("weight regex")
    });

    let grams = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let caps = re.captures(s)?;
            let qty: f64 = caps.get(1)?.as_str().parse().ok()?;
            match caps.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
                Some("kg") | Some("킬로") => qty * 1000.0,
                Some("oz") => qty * 28.349_523_125,
                Some("lb") | Some("lbs") => qty * 453.592_37,
                _ => qty,
            }
        }
        _ => return None,
    };
    (grams.is_finite() && grams > 0.0 && grams <= u32::MAX as f64).then(|| grams.round() as u32)
}

/// Descriptor lookup, longest match first so "medium dark" beats "dark".
static ROAST_TABLE: Lazy<Vec<(&'static str, RoastLevel)>> = Lazy::new(|| {
    let mut t = vec![
        ("light", RoastLevel::Light),
        ("cinnamon", RoastLevel::Light),
        ("nordic", RoastLevel::Light),
        ("라이트", RoastLevel::Light),
        ("약배전", RoastLevel::Light),
        ("시나몬", RoastLevel::Light),
        ("medium light", RoastLevel::MediumLight),
        ("medium-light", RoastLevel::MediumLight),
        ("light medium", RoastLevel::MediumLight),
        ("light-medium", RoastLevel::MediumLight),
        ("미디엄라이트", RoastLevel::MediumLight),
        ("미디엄 라이트", RoastLevel::MediumLight),
        ("하이", RoastLevel::MediumLight),
        ("medium", RoastLevel::Medium),
        ("city", RoastLevel::Medium),
        ("미디엄", RoastLevel::Medium),
        ("중배전", RoastLevel::Medium),
        ("시티", RoastLevel::Medium),
        ("medium dark", RoastLevel::MediumDark),
        ("medium-dark", RoastLevel::MediumDark),
        ("full city", RoastLevel::MediumDark),
        ("미디엄다크", RoastLevel::MediumDark),
        ("미디엄 다크", RoastLevel::MediumDark),
        ("풀시티", RoastLevel::MediumDark),
        ("dark", RoastLevel::Dark),
        ("french", RoastLevel::Dark),
        ("italian", RoastLevel::Dark),
        ("espresso roast", RoastLevel::Dark),
        ("다크", RoastLevel::Dark),
        ("강배전", RoastLevel::Dark),
        ("프렌치", RoastLevel::Dark),
        ("이탈리안", RoastLevel::Dark),
    ];
    t.sort_by_key(|(k, _)| std::cmp::Reverse(k.chars().count()));
    t
});

/// Map a free-text roast descriptor to the closed enumeration.
pub fn roast_level(descriptor: &str) -> RoastLevel {
    let d = clean_text(descriptor).to_lowercase();
    if d.is_empty() {
        return RoastLevel::Unspecified;
    }
    ROAST_TABLE
        .iter()
        .find(|(k, _)| d.contains(k))
        .map(|(_, level)| *level)
        .unwrap_or(RoastLevel::Unspecified)
}

/// Normalize one listing, stamping both timestamps with `stamped_at`.
pub fn normalize(
    listing: &RawListing,
    stamped_at: DateTime<Utc>,
) -> Result<CanonicalBean, Rejection> {
    let text = |key: &str| listing.get(key).and_then(value_text);

    let source_id = clean_text(&listing.source_id);
    if source_id.is_empty() {
        return Err(Rejection::MissingSource);
    }
    let name = text(field::NAME).ok_or(Rejection::MissingName)?;
    let brand = text(field::BRAND).ok_or(Rejection::MissingBrand)?;
    let price = listing
        .get(field::PRICE)
        .and_then(parse_price)
        .ok_or(Rejection::InvalidPrice)?;

    let roast_level = text(field::ROAST)
        .map(|r| roast_level(&r))
        .unwrap_or(RoastLevel::Unspecified);

    let is_active = match listing.get(field::ACTIVE) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !matches!(s.trim().to_lowercase().as_str(), "false" | "0" | "no"),
        _ => true,
    };

    Ok(CanonicalBean {
        name,
        brand,
        price,
        origin: text(field::ORIGIN),
        weight_g: listing.get(field::WEIGHT).and_then(parse_weight_grams),
        roast_level,
        flavors: listing.get(field::FLAVORS).map(value_list).unwrap_or_default(),
        processing: text(field::PROCESSING),
        variety: text(field::VARIETY),
        description: text(field::DESCRIPTION),
        images: listing.get(field::IMAGES).map(value_urls).unwrap_or_default(),
        url: text(field::URL),
        source_id,
        is_active,
        synthetic: listing.synthetic,
        created_at: stamped_at,
        last_updated: stamped_at,
    })
}
