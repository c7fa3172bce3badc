// src/crawl/mod.rs
pub mod feed;
pub mod html;
pub mod http;
pub mod shopify;
pub mod types;

pub use types::{field, Crawler, RawListing};
