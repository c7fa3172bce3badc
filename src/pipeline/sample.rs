//! Placeholder listings for test-mode runs whose crawl came back empty.
//! Only the orchestrator's test-mode branch calls this.

use crate::config::SourceConfig;
use crate::crawl::{field, RawListing};

const ORIGINS: [&str; 5] = ["Ethiopia", "Colombia", "Kenya", "Guatemala", "Brazil"];
const ROASTS: [&str; 5] = ["light", "medium light", "medium", "medium dark", "dark"];
const FLAVORS: [&str; 5] = [
    "jasmine, bergamot",
    "caramel, red apple",
    "blackcurrant, grapefruit",
    "cocoa, orange",
    "nutty, chocolate",
];

/// `n` deterministic listings, marked synthetic and tagged with the source id.
pub fn synthetic_listings(source: &SourceConfig, n: usize) -> Vec<RawListing> {
    let brand = source.default_brand();
    (0..n)
        .map(|i| {
            let k = i % ORIGINS.len();
            let mut l = RawListing::new(&source.id)
                .with(field::NAME, format!("Sample {} #{}", ORIGINS[k], i + 1))
                .with(field::BRAND, brand)
                .with(field::PRICE, 15_000 + 1_000 * i as u64)
                .with(field::ORIGIN, ORIGINS[k])
                .with(field::WEIGHT, "200g")
                .with(field::ROAST, ROASTS[k])
                .with(field::FLAVORS, FLAVORS[k])
                .with(
                    field::DESCRIPTION,
                    format!("Synthetic placeholder for {}", source.label),
                );
            l.synthetic = true;
            l
        })
        .collect()
}
