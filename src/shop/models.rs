//! Data models for discovered offers.

use crate::extract::{Discount, OfferFields};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum title length kept on an offer, in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// Title used when nothing better could be extracted.
pub const PLACEHOLDER_TITLE: &str = "Product on sale";

/// A product link found on a listing page, with the markup around it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Absolute, normalized product URL.
    pub url: String,
    /// Listing fragment (or serialized JSON node) describing the product.
    pub context: String,
    /// Name found alongside the link in embedded JSON.
    pub title_hint: Option<String>,
}

/// A candidate discounted product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    /// Stable dedup key derived from the canonical URL.
    pub identity: String,
    /// Absolute product URL
    pub url: String,
    /// Product title, truncated
    pub title: String,
    /// Current price
    pub price_now: Option<f64>,
    /// Reference (pre-discount) price; always above `price_now` when both are set
    pub price_before: Option<f64>,
    /// Resolved discount, if any
    pub discount: Option<Discount>,
}

impl Offer {
    /// Builds an offer from extracted fields.
    pub fn new(url: impl Into<String>, fields: OfferFields) -> Self {
        let url = url.into();
        let discount = fields.discount();
        let title = truncate_title(fields.title.as_deref().unwrap_or(PLACEHOLDER_TITLE));

        let identity = if url.is_empty() {
            content_identity(&title, fields.price_now, fields.price_before)
        } else {
            url_identity(&url)
        };

        Self {
            identity,
            url,
            title,
            price_now: fields.price_now,
            price_before: fields.price_before,
            discount,
        }
    }

    /// Returns the discount percentage if one was resolved.
    pub fn discount_pct(&self) -> Option<u8> {
        self.discount.map(|d| d.pct)
    }
}

/// Strips the query string and fragment so tracking parameters don't change identity.
pub fn canonical_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/')
}

/// Identity for an offer with a URL: a short SHA-256 of its canonical form.
pub fn url_identity(url: &str) -> String {
    short_hash(canonical_url(url))
}

/// Identity for an offer without a URL, hashed from its content.
pub fn content_identity(title: &str, price_now: Option<f64>, price_before: Option<f64>) -> String {
    let fmt_price = |p: Option<f64>| p.map(|v| format!("{:.2}", v)).unwrap_or_default();
    short_hash(&format!("{}|{}|{}", title, fmt_price(price_now), fmt_price(price_before)))
}

fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

/// Truncates a title to [`MAX_TITLE_CHARS`] characters.
pub fn truncate_title(title: &str) -> String {
    let title = title.trim();
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((idx, _)) => format!("{}...", title[..idx].trim_end()),
        None => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DiscountSource;

    fn fields(title: Option<&str>, now: Option<f64>, before: Option<f64>) -> OfferFields {
        OfferFields {
            title: title.map(String::from),
            price_now: now,
            price_before: before,
            stated_discount: None,
        }
    }

    #[test]
    fn test_offer_from_prices() {
        let offer = Offer::new(
            "https://shop.test/product/1",
            fields(Some("Smart TV"), Some(40.0), Some(100.0)),
        );

        assert_eq!(offer.title, "Smart TV");
        assert_eq!(offer.discount_pct(), Some(60));
        assert_eq!(offer.discount.unwrap().source, DiscountSource::Prices);
        assert_eq!(offer.identity.len(), 16);
    }

    #[test]
    fn test_offer_placeholder_title() {
        let offer = Offer::new("https://shop.test/product/1", fields(None, None, None));
        assert_eq!(offer.title, PLACEHOLDER_TITLE);
        assert!(offer.discount_pct().is_none());
    }

    #[test]
    fn test_identity_ignores_query_and_fragment() {
        let a = url_identity("https://shop.test/product/1/tv");
        let b = url_identity("https://shop.test/product/1/tv?utm_source=x&sid=9");
        let c = url_identity("https://shop.test/product/1/tv/#reviews");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, url_identity("https://shop.test/product/2/tv"));
    }

    #[test]
    fn test_identity_is_stable() {
        // Must never change between releases, or every offer gets re-notified
        assert_eq!(url_identity("https://shop.test/product/1"), url_identity("https://shop.test/product/1"));
        assert!(url_identity("https://shop.test/product/1").chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_identity_without_url() {
        let offer = Offer::new("", fields(Some("Blender"), Some(10.0), Some(20.0)));
        assert_eq!(offer.identity, content_identity("Blender", Some(10.0), Some(20.0)));
        assert_ne!(offer.identity, content_identity("Blender", Some(11.0), Some(20.0)));
    }

    #[test]
    fn test_canonical_url() {
        assert_eq!(canonical_url("https://shop.test/product/1?x=1"), "https://shop.test/product/1");
        assert_eq!(canonical_url("https://shop.test/product/1/"), "https://shop.test/product/1");
        assert_eq!(canonical_url("https://shop.test/product/1"), "https://shop.test/product/1");
    }

    #[test]
    fn test_truncate_title() {
        let long = "a".repeat(200);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), MAX_TITLE_CHARS + 3);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_title("  Short  "), "Short");

        // Multi-byte characters must not split
        let accented = "é".repeat(150);
        assert!(truncate_title(&accented).starts_with("ééé"));
    }

    #[test]
    fn test_offer_serde() {
        let offer = Offer::new("https://shop.test/product/1", fields(Some("TV"), Some(40.0), Some(100.0)));
        let json = serde_json::to_string(&offer).unwrap();
        assert!(json.contains("\"prices\""));

        let parsed: Offer = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.identity, offer.identity);
        assert_eq!(parsed.discount_pct(), Some(60));
    }
}
