//! Walks embedded JSON documents looking for product-shaped objects.
//!
//! Storefronts ship their catalogue state as JSON inside `<script>` tags
//! (JSON-LD, `__NEXT_DATA__`, hydration blobs) with no stable schema, so the
//! tree is matched structurally: any object with a name-like and a link-like
//! string field is treated as a product.

use super::patterns;
use serde_json::{Map, Value};
use scraper::Html;
use tracing::trace;

/// A structural predicate over JSON objects.
pub trait Shape {
    type Match;

    /// Returns a match if the object has this shape.
    fn matches(&self, node: &Map<String, Value>) -> Option<Self::Match>;
}

/// Collects every object under `root` that matches `shape`, depth-first.
///
/// Array order is preserved. Matched objects are not searched further; their
/// children belong to them.
pub fn find_all<S: Shape>(root: &Value, shape: &S) -> Vec<S::Match> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(value) = stack.pop() {
        match value {
            Value::Object(map) => {
                if let Some(hit) = shape.matches(map) {
                    found.push(hit);
                    continue;
                }
                stack.extend(map.values().rev());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }

    found
}

/// A product-like node found in embedded JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductNode {
    /// Value of the name-like field.
    pub name: String,
    /// Value of the link-like field, not yet normalized.
    pub url: String,
    /// The whole object serialized back to JSON; used as the price context.
    pub raw: String,
}

/// Objects with a name-like field and a link-like field.
pub struct ProductShape;

impl ProductShape {
    const NAME_FIELDS: &'static [&'static str] = &["name", "displayName", "productName", "title"];
    const LINK_FIELDS: &'static [&'static str] = &["url", "link", "href", "pdpUrl", "productUrl"];

    fn first_string<'a>(node: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
        fields
            .iter()
            .filter_map(|field| node.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

impl Shape for ProductShape {
    type Match = ProductNode;

    fn matches(&self, node: &Map<String, Value>) -> Option<ProductNode> {
        let name = Self::first_string(node, Self::NAME_FIELDS)?;
        let url = Self::first_string(node, Self::LINK_FIELDS)?;

        Some(ProductNode {
            name: name.to_string(),
            url: url.to_string(),
            raw: serde_json::to_string(node).unwrap_or_default(),
        })
    }
}

/// Parses every embedded JSON script in the page and returns its product nodes.
pub fn product_nodes(document: &Html) -> Vec<ProductNode> {
    let mut nodes = Vec::new();

    for script in document.select(&patterns::json::SCRIPTS) {
        let text = script.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(text) {
            Ok(value) => nodes.extend(find_all(&value, &ProductShape)),
            Err(e) => trace!("Skipping unparseable JSON script: {}", e),
        }
    }

    nodes
}
