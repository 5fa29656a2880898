//! Discount resolution from a current/reference price pair.

use serde::{Deserialize, Serialize};

/// Where a discount percentage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountSource {
    /// Computed from `price_now` and `price_before`.
    Prices,
    /// Read from a textual marker such as "-70%" or "40% OFF".
    Marker,
}

/// A validated discount percentage in `[0, 100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub pct: u8,
    pub source: DiscountSource,
}

impl Discount {
    pub fn from_prices(pct: u8) -> Self {
        Self { pct, source: DiscountSource::Prices }
    }

    pub fn from_marker(pct: u8) -> Self {
        Self { pct, source: DiscountSource::Marker }
    }
}

/// Drops a reference price that does not exceed the current price.
///
/// Such a pair carries no discount information; most of the time the two
/// candidates belong to different products or price tiers.
pub fn sanitize(price_now: Option<f64>, price_before: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (price_now, price_before) {
        (Some(now), Some(before)) if before <= now => (Some(now), None),
        pair => pair,
    }
}

/// Computes `round((1 - now / before) * 100)` for a valid price pair.
///
/// Returns `None` when either price is missing, the reference price does not
/// exceed the current one, or the result falls outside `[0, 100)`.
pub fn resolve(price_now: Option<f64>, price_before: Option<f64>) -> Option<u8> {
    let (Some(now), Some(before)) = sanitize(price_now, price_before) else {
        return None;
    };

    if now < 0.0 || before <= 0.0 {
        return None;
    }

    let pct = ((1.0 - now / before) * 100.0).round();
    if !(0.0..100.0).contains(&pct) {
        return None;
    }

    Some(pct as u8)
}
