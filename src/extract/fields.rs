//! Layered field extraction: title, prices and stated discount markers.
//!
//! Each heuristic is an [`Extractor`] strategy. Ordered lists of strategies are
//! tried until one produces a value, so a new markup convention is one more
//! strategy in a list rather than another branch in a parser.

use super::discount::{self, Discount};
use super::links::{normalize_url, url_origin};
use super::{clean_text, parse_price, patterns, Markup};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// A single extraction heuristic.
pub trait Extractor: Send + Sync {
    type Output;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Returns the extracted value, or `None` if this heuristic found nothing.
    fn try_extract(&self, markup: &Markup<'_>) -> Option<Self::Output>;
}

type Strategies<T> = Vec<Box<dyn Extractor<Output = T>>>;

/// Returns the first successful strategy's output.
fn first_success<T>(strategies: &[Box<dyn Extractor<Output = T>>], markup: &Markup<'_>) -> Option<T> {
    strategies.iter().find_map(|strategy| {
        let value = strategy.try_extract(markup);
        if value.is_some() {
            trace!("Extractor '{}' matched", strategy.name());
        }
        value
    })
}

/// Merges the candidates of every strategy in a tier.
fn pool(strategies: &[Box<dyn Extractor<Output = Vec<f64>>>], markup: &Markup<'_>) -> Vec<f64> {
    strategies.iter().filter_map(|s| s.try_extract(markup)).flatten().collect()
}

/// Fields extracted from one product's markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferFields {
    pub title: Option<String>,
    pub price_now: Option<f64>,
    /// Already sanitized: `None` whenever it would not exceed `price_now`.
    pub price_before: Option<f64>,
    /// Percentage read from a textual marker; only looked up when the prices
    /// don't resolve to a discount.
    pub stated_discount: Option<u8>,
}

impl OfferFields {
    /// Resolves the discount: from the prices first, then from the stated marker.
    pub fn discount(&self) -> Option<Discount> {
        discount::resolve(self.price_now, self.price_before)
            .map(Discount::from_prices)
            .or_else(|| self.stated_discount.map(Discount::from_marker))
    }
}

/// Runs the title, price and marker strategies over a markup context.
pub struct FieldExtractor {
    titles: Strategies<String>,
    current_prices: Strategies<Vec<f64>>,
    reference_prices: Strategies<Vec<f64>>,
    fallback_prices: Strategies<Vec<f64>>,
    markers: Strategies<u8>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    /// Creates an extractor with the standard strategy lists.
    pub fn new() -> Self {
        Self {
            titles: vec![
                Box::new(OgTitle),
                Box::new(DocumentTitle),
                Box::new(TitleHint),
                Box::new(JsonName),
                Box::new(AnchorText),
            ],
            current_prices: vec![
                Box::new(JsonKeyPrices::new("current-keys", &patterns::prices::CURRENT_KEYS)),
                Box::new(MetaPrice),
            ],
            reference_prices: vec![Box::new(JsonKeyPrices::new(
                "reference-keys",
                &patterns::prices::REFERENCE_KEYS,
            ))],
            fallback_prices: vec![Box::new(InlineCurrencyPrices)],
            markers: vec![
                Box::new(MarkerPattern::new("minus-percent", &patterns::markers::MINUS_PERCENT)),
                Box::new(MarkerPattern::new("percent-off", &patterns::markers::PERCENT_OFF)),
                Box::new(MarkerPattern::new("percent-dscto", &patterns::markers::PERCENT_DSCTO)),
            ],
        }
    }

    /// Extracts every field from the markup.
    pub fn extract(&self, markup: &Markup<'_>) -> OfferFields {
        let title = first_success(&self.titles, markup);
        let (price_now, price_before) = self.extract_prices(markup);

        let stated_discount = if discount::resolve(price_now, price_before).is_none() {
            first_success(&self.markers, markup)
        } else {
            None
        };

        OfferFields { title, price_now, price_before, stated_discount }
    }

    /// Resolves `(price_now, price_before)` from the candidate pools.
    fn extract_prices(&self, markup: &Markup<'_>) -> (Option<f64>, Option<f64>) {
        let mut current = pool(&self.current_prices, markup);
        if current.is_empty() {
            current = pool(&self.fallback_prices, markup);
        }
        let reference = pool(&self.reference_prices, markup);

        trace!("Price candidates: current={:?} reference={:?}", current, reference);

        let lowest = current.iter().copied().reduce(f64::min);
        let highest = current.iter().copied().reduce(f64::max);

        let (now, before) = match reference.iter().copied().reduce(f64::max) {
            Some(before) => (lowest, Some(before)),
            // Untagged price list: the spread between its extremes is the discount
            None if lowest != highest => (lowest, highest),
            None => (lowest, None),
        };

        discount::sanitize(now, before)
    }
}

// Title strategies

/// `<meta property="og:title">`.
pub struct OgTitle;

impl Extractor for OgTitle {
    type Output = String;

    fn name(&self) -> &'static str {
        "og-title"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<String> {
        if !markup.is_document() {
            return None;
        }
        markup
            .html()
            .select(&patterns::title::OG_TITLE)
            .filter_map(|e| e.value().attr("content"))
            .find_map(clean_text)
    }
}

/// `<title>` element of the page head.
pub struct DocumentTitle;

impl Extractor for DocumentTitle {
    type Output = String;

    fn name(&self) -> &'static str {
        "document-title"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<String> {
        if !markup.is_document() {
            return None;
        }
        markup
            .html()
            .select(&patterns::title::DOCUMENT)
            .find_map(|e| clean_text(&e.text().collect::<String>()))
    }
}

/// Name carried over from the embedded JSON node the link came from.
pub struct TitleHint;

impl Extractor for TitleHint {
    type Output = String;

    fn name(&self) -> &'static str {
        "title-hint"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<String> {
        markup.title_hint().and_then(clean_text)
    }
}

/// `"displayName"` / `"productName"` / `"name"` JSON fields in the fragment.
pub struct JsonName;

impl Extractor for JsonName {
    type Output = String;

    fn name(&self) -> &'static str {
        "json-name"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<String> {
        patterns::title::JSON_NAME.captures_iter(markup.raw()).find_map(|c| clean_text(&c[1]))
    }
}

/// Longest anchor text in the fragment; card links often wrap only an image.
///
/// With a known link only the anchors pointing at it count, so a neighbouring
/// banner or menu link never names the product.
pub struct AnchorText;

impl Extractor for AnchorText {
    type Output = String;

    fn name(&self) -> &'static str {
        "anchor-text"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<String> {
        let link = markup.link();
        let origin = link.map(url_origin).unwrap_or_default();

        markup
            .html()
            .select(&patterns::title::ANCHOR)
            .filter(|e| match link {
                Some(link) => e.value().attr("href").is_some_and(|href| normalize_url(href, origin) == link),
                None => true,
            })
            .filter_map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|text| text.chars().any(char::is_alphabetic))
            .max_by_key(|text| text.len())
    }
}

// Price strategies

/// Every value of a family of JSON price keys.
pub struct JsonKeyPrices {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl JsonKeyPrices {
    pub fn new(name: &'static str, pattern: &'static LazyLock<Regex>) -> Self {
        Self { name, pattern }
    }
}

impl Extractor for JsonKeyPrices {
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        self.name
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<Vec<f64>> {
        let values: Vec<f64> = self
            .pattern
            .captures_iter(markup.raw())
            .filter_map(|c| parse_price(&c[1]))
            .filter(|v| *v > 0.0)
            .collect();

        (!values.is_empty()).then_some(values)
    }
}

/// Page metadata price attributes (`product:price:amount`, `itemprop="price"`).
pub struct MetaPrice;

impl Extractor for MetaPrice {
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "meta-price"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<Vec<f64>> {
        let values: Vec<f64> = markup
            .html()
            .select(&patterns::prices::META)
            .filter_map(|e| e.value().attr("content"))
            .filter_map(parse_price)
            .filter(|v| *v > 0.0)
            .collect();

        (!values.is_empty()).then_some(values)
    }
}

/// Currency-prefixed inline tokens; last resort when no structured price exists.
pub struct InlineCurrencyPrices;

impl Extractor for InlineCurrencyPrices {
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "inline-currency"
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<Vec<f64>> {
        let values: Vec<f64> = patterns::prices::INLINE_CURRENCY
            .captures_iter(markup.raw())
            .filter_map(|c| parse_price(&c[1]))
            .filter(|v| *v > 0.0)
            .collect();

        (!values.is_empty()).then_some(values)
    }
}

// Discount marker strategies

/// First percentage in `[0, 100)` matched by a marker pattern in the text
/// content; attributes and stylesheets are full of `-50%` offsets.
pub struct MarkerPattern {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl MarkerPattern {
    pub fn new(name: &'static str, pattern: &'static LazyLock<Regex>) -> Self {
        Self { name, pattern }
    }
}

impl Extractor for MarkerPattern {
    type Output = u8;

    fn name(&self) -> &'static str {
        self.name
    }

    fn try_extract(&self, markup: &Markup<'_>) -> Option<u8> {
        self.pattern
            .captures_iter(markup.text())
            .filter_map(|c| c[1].parse::<u8>().ok())
            .find(|pct| *pct < 100)
    }
}
