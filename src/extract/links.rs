//! Product link discovery on listing pages.

use super::{json_tree, patterns};
use crate::shop::{Candidate, Site};
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::{debug, trace};

/// How many ancestors of a product anchor are considered for its card.
const MAX_CARD_DEPTH: usize = 8;

/// One pattern match of a product link.
struct LinkHit {
    url: String,
    start: usize,
    end: usize,
    pattern: &'static str,
}

/// Finds product links in listing markup and cuts the markup describing each.
pub struct LinkExtractor {
    origin: String,
    token: String,
    patterns: Vec<(&'static str, Regex)>,
    context_chars: usize,
    max_links: usize,
}

impl LinkExtractor {
    /// Compiles the link patterns for a site's product-path token.
    pub fn new(site: &Site, context_chars: usize, max_links: usize) -> anyhow::Result<Self> {
        let token = site.product_token.clone();
        if token.is_empty() {
            anyhow::bail!("Site product token must not be empty");
        }

        let plain = regex_lite::escape(&token);
        let escaped = regex_lite::escape(&token.replace('/', "\\/"));

        // Ordered by reliability; later patterns mostly catch what earlier ones miss
        let sources = [
            ("href-double", format!(r#"href\s*=\s*"([^"]*{plain}[^"]*)""#)),
            ("href-single", format!(r#"href\s*=\s*'([^']*{plain}[^']*)'"#)),
            ("absolute", format!(r#"(https?://[^\s"'<>\\]*{plain}[^\s"'<>\\]*)"#)),
            ("json-escaped", format!(r#""([^"\s<>]*{escaped}[^"\s<>]*)""#)),
            ("json-plain", format!(r#""([^"\s<>\\]*{plain}[^"\s<>\\]*)""#)),
        ];

        let mut patterns = Vec::with_capacity(sources.len());
        for (name, source) in sources {
            let regex = Regex::new(&source)
                .map_err(|e| anyhow::anyhow!("Invalid link pattern '{}': {}", name, e))?;
            patterns.push((name, regex));
        }

        Ok(Self {
            origin: site.origin().to_string(),
            token,
            patterns,
            context_chars,
            max_links,
        })
    }

    /// Returns deduplicated candidates in first-seen order, capped at `max_links`.
    ///
    /// A link inside an element of its own (a product card) takes that element
    /// as context; any other link gets a raw window that stops at the
    /// neighbouring product links.
    pub fn extract(&self, markup: &str) -> Vec<Candidate> {
        let hits = self.link_hits(markup);
        let document = Html::parse_document(markup);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for hit in &hits {
            if seen.contains(hit.url.as_str()) {
                continue;
            }
            if candidates.len() >= self.max_links {
                break;
            }

            trace!("Link via {}: {}", hit.pattern, hit.url);
            let context = match self.card(&document, &hit.url) {
                Some(card) => card,
                None => bounded_window(markup, &hits, hit, self.context_chars).to_string(),
            };

            seen.insert(hit.url.as_str());
            candidates.push(Candidate { url: hit.url.clone(), context, title_hint: None });
        }

        // Embedded JSON catalogue state
        for node in json_tree::product_nodes(&document) {
            let Some(url) = self.normalize(&node.url) else { continue };

            // Already found: keep that context, borrow the name
            if let Some(known) = candidates.iter_mut().find(|c| c.url == url) {
                known.title_hint.get_or_insert(node.name);
                continue;
            }

            if candidates.len() >= self.max_links {
                break;
            }

            trace!("Link via json-tree: {}", url);
            candidates.push(Candidate { url, context: node.raw, title_hint: Some(node.name) });
        }

        debug!("Extracted {} candidate links", candidates.len());
        candidates
    }

    /// Every pattern match, in pattern order, with its position in the markup.
    fn link_hits(&self, markup: &str) -> Vec<LinkHit> {
        let mut hits = Vec::new();

        for (name, pattern) in &self.patterns {
            for caps in pattern.captures_iter(markup) {
                let Some(m) = caps.get(1) else { continue };
                let Some(url) = self.normalize(m.as_str()) else {
                    trace!("Dropping malformed link match: {}", m.as_str());
                    continue;
                };
                hits.push(LinkHit { url, start: m.start(), end: m.end(), pattern: name });
            }
        }

        hits
    }

    /// Serialized markup of the largest element around the link's first anchor
    /// that links to no other product.
    ///
    /// `None` when the anchor itself is as far as that goes (links laid out as
    /// bare siblings) or when no anchor carries the link.
    fn card(&self, document: &Html, url: &str) -> Option<String> {
        let anchor = document
            .select(&patterns::links::ANCHOR_HREF)
            .find(|a| a.value().attr("href").and_then(|h| self.normalize(h)).as_deref() == Some(url))?;

        let mut card = anchor;
        for _ in 0..MAX_CARD_DEPTH {
            let Some(parent) = card.parent().and_then(ElementRef::wrap) else { break };
            if matches!(parent.value().name(), "body" | "html") || self.links_elsewhere(parent, url) {
                break;
            }
            card = parent;
        }

        (card.id() != anchor.id()).then(|| card.html())
    }

    /// Returns true if the element contains a product link other than `url`.
    fn links_elsewhere(&self, element: ElementRef<'_>, url: &str) -> bool {
        element
            .select(&patterns::links::ANCHOR_HREF)
            .filter_map(|a| a.value().attr("href").and_then(|h| self.normalize(h)))
            .any(|other| other != url)
    }

    /// Normalizes a raw match; `None` if the result lost the product token.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let url = normalize_url(raw, &self.origin);
        url.contains(&self.token).then_some(url)
    }
}

/// Turns a raw href or JSON string into an absolute URL.
///
/// `\/` and `/` are unescaped first, then `//host/path` gets `https:`,
/// `/path` is resolved against `origin`, and absolute URLs pass through.
pub fn normalize_url(raw: &str, origin: &str) -> String {
    let url = raw
        .trim()
        .replace("\\/", "/")
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("&amp;", "&");
    let origin = origin.trim_end_matches('/');

    if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with('/') {
        format!("{}{}", origin, url)
    } else {
        format!("{}/{}", origin, url)
    }
}

/// Scheme and host of an absolute URL, e.g. `https://shop.test`.
pub fn url_origin(url: &str) -> &str {
    let host_start = url.find("://").map_or(0, |i| i + 3);
    match url[host_start..].find('/') {
        Some(i) => &url[..host_start + i],
        None => url,
    }
}

/// The window around `hit`, stopped at the closest matches of other product links.
fn bounded_window<'m>(markup: &'m str, hits: &[LinkHit], hit: &LinkHit, context_chars: usize) -> &'m str {
    let others = hits.iter().filter(|h| h.url != hit.url);
    let lower = others.clone().map(|h| h.end).filter(|&end| end <= hit.start).max().unwrap_or(0);
    let upper = others.map(|h| h.start).filter(|&start| start >= hit.end).min().unwrap_or(markup.len());

    let bounded = &markup[lower..upper];
    context_window(bounded, hit.start - lower, hit.end - lower, context_chars)
}

/// Slices `context_chars` characters on each side of `[start, end)`.
fn context_window(markup: &str, start: usize, end: usize, context_chars: usize) -> &str {
    let from = markup[..start]
        .char_indices()
        .rev()
        .take(context_chars)
        .last()
        .map_or(start, |(i, _)| i);
    let to = markup[end..].char_indices().nth(context_chars).map_or(markup.len(), |(i, _)| end + i);

    &markup[from..to]
}
