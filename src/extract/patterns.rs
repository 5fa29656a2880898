//! Regex patterns and CSS selectors for offer extraction.
//!
//! This file contains every markup pattern the extractors rely on.
//! Update this file when a storefront changes its markup.
//!
//! **Update process**: When extraction fails, capture a markup sample,
//! update the patterns, and add a test fixture.
//!
//! Link patterns depend on the site's product-path token and are compiled
//! per site in [`crate::extract::links`].

use regex_lite::Regex;
use scraper::Selector;
use std::sync::LazyLock;

/// Quote forms seen around JSON keys: plain, backslash-escaped, HTML-escaped.
macro_rules! json_key_pattern {
    ($keys:literal) => {
        concat!(
            r#"(?:\\?"|&quot;)(?:"#,
            $keys,
            r#")(?:\\?"|&quot;)\s*:\s*\[?\s*(?:\\?"|&quot;)?\s*(?:S/\.?|US\$|\$|€|£)?\s*([0-9][0-9.,]*)"#
        )
    };
}

/// Selectors for title extraction.
pub mod title {
    use super::*;

    /// Open Graph title meta tag.
    pub static OG_TITLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("meta[property='og:title'], meta[name='og:title']").unwrap());

    /// Document title element; `<title>` inside inline SVG icons is not it.
    pub static DOCUMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("head > title").unwrap());

    /// Hyperlinks inside a listing fragment.
    pub static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

    /// Name-like JSON string fields inside a listing fragment.
    pub static JSON_NAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?:\\?"|&quot;)(?:displayName|productName|name)(?:\\?"|&quot;)\s*:\s*(?:\\?"|&quot;)([^"\\&<>]{3,200})"#)
            .unwrap()
    });
}

/// Selectors for product cards on listing pages.
pub mod links {
    use super::*;

    /// Anchors that carry a link.
    pub static ANCHOR_HREF: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
}

/// Patterns for price candidates.
pub mod prices {
    use super::*;

    /// JSON keys carrying "current price" semantics.
    pub static CURRENT_KEYS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(json_key_pattern!(
            "price|salePrice|offerPrice|eventPrice|internetPrice|cmrPrice|currentPrice|finalPrice|sellingPrice|lowPrice|bestPrice|promoPrice|specialPrice|priceNow"
        ))
        .unwrap()
    });

    /// JSON keys carrying "reference / original price" semantics.
    pub static REFERENCE_KEYS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(json_key_pattern!(
            "normalPrice|listPrice|originalPrice|regularPrice|wasPrice|oldPrice|highPrice|referencePrice|fullPrice|strikePrice|crossedPrice|priceBefore|msrp"
        ))
        .unwrap()
    });

    /// Page metadata price attributes.
    pub static META: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "meta[property='product:price:amount'], \
             meta[property='og:price:amount'], \
             meta[itemprop='price']",
        )
        .unwrap()
    });

    /// Currency-prefixed inline text like "S/ 1,299.90" or "$ 49".
    pub static INLINE_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?:S/\.?|US\$|R\$|\$|€|£)(?:\s|&nbsp;|&#160;)*([0-9][0-9.,]*)"#).unwrap()
    });
}

/// Patterns for directly-stated discount markers, in priority order.
pub mod markers {
    use super::*;

    /// "-70%", "− 45 %", "–30%".
    pub static MINUS_PERCENT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[-−–]\s*(\d{1,3})\s*%").unwrap());

    /// "70% OFF".
    pub static PERCENT_OFF: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)(\d{1,3})\s*%\s*off").unwrap());

    /// "70% DSCTO", "70% de descuento".
    pub static PERCENT_DSCTO: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(\d{1,3})\s*%\s*(?:de\s+)?(?:dscto|dcto|descuento)").unwrap()
    });
}

/// Embedded JSON documents.
pub mod json {
    use super::*;

    pub static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "script[type='application/ld+json'], \
             script[type='application/json'], \
             script#__NEXT_DATA__",
        )
        .unwrap()
    });
}

/// Phrases that identify bot-block and challenge pages (matched lowercase).
pub const BLOCK_MARKERS: &[&str] = &[
    "px-captcha",
    "captcha-delivery",
    "/errors/validatecaptcha",
    "are you a robot",
    "verify you are human",
    "unusual traffic",
    "access denied",
    "pardon our interruption",
    "challenge-platform",
    "cf-chl-",
    "request unsuccessful. incapsula",
];
