//! Offer extraction from raw storefront markup.
//!
//! Everything here is best-effort: a missing field resolves to `None` and is
//! filtered out later, it never aborts a scan.

pub mod discount;
pub mod fields;
pub mod json_tree;
pub mod links;
pub mod patterns;
pub mod price;

pub use discount::{Discount, DiscountSource};
pub use fields::{Extractor, FieldExtractor, OfferFields};
pub use links::LinkExtractor;
pub use price::parse_price;

use scraper::Html;

/// Markup handed to the field extractors: the raw text plus its parsed tree.
pub struct Markup<'a> {
    raw: &'a str,
    html: Html,
    text: String,
    document: bool,
    title_hint: Option<&'a str>,
    link: Option<&'a str>,
}

impl<'a> Markup<'a> {
    /// Wraps a full page.
    pub fn document(raw: &'a str) -> Self {
        Self::new(raw, Html::parse_document(raw), true)
    }

    /// Wraps a listing fragment cut out of a larger page.
    pub fn fragment(raw: &'a str) -> Self {
        Self::new(raw, Html::parse_fragment(raw), false)
    }

    fn new(raw: &'a str, html: Html, document: bool) -> Self {
        let text = visible_text(&html);
        Self { raw, html, text, document, title_hint: None, link: None }
    }

    /// Attaches a title found while discovering the link (embedded JSON name).
    pub fn with_title_hint(mut self, hint: Option<&'a str>) -> Self {
        self.title_hint = hint;
        self
    }

    /// Attaches the absolute product URL the fragment was cut around.
    pub fn with_link(mut self, url: &'a str) -> Self {
        self.link = Some(url);
        self
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Text nodes joined by spaces, without stylesheet contents.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true for a full page, false for a listing fragment.
    pub fn is_document(&self) -> bool {
        self.document
    }

    pub fn title_hint(&self) -> Option<&'a str> {
        self.title_hint
    }

    pub fn link(&self) -> Option<&'a str> {
        self.link
    }
}

fn visible_text(html: &Html) -> String {
    let mut text = String::new();

    for node in html.root_element().descendants() {
        let Some(chunk) = node.value().as_text() else { continue };
        let in_style = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name() == "style"))
            .unwrap_or(false);
        if in_style {
            continue;
        }

        text.push_str(&chunk.replace('\u{a0}', " "));
        text.push(' ');
    }

    text
}

/// Returns true if the markup looks like a bot-block or challenge page.
pub fn is_blocked(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    patterns::BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Collapses whitespace runs and trims; `None` when nothing is left.
pub(crate) fn clean_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}
