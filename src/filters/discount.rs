//! Minimum discount filter.

use super::Filter;
use crate::shop::Offer;

/// Keeps offers whose resolved discount is at least the threshold.
///
/// Discounts stay below 100, so a threshold of 100 or more lets nothing through.
pub struct DiscountFilter {
    threshold: u8,
}

impl DiscountFilter {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl Filter for DiscountFilter {
    fn matches(&self, offer: &Offer) -> bool {
        // Unknown discounts never qualify
        offer.discount_pct().is_some_and(|pct| pct >= self.threshold)
    }

    fn description(&self) -> String {
        format!("Discount: >= {}%", self.threshold)
    }
}
