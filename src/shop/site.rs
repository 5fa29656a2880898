//! Storefront site settings and scan sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Site-specific settings: where pages live and how product URLs look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Scheme and host used to resolve relative links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path fragment every product page URL contains.
    #[serde(default = "default_product_token")]
    pub product_token: String,

    /// Search URL template; `{query}` is replaced with the encoded keyword.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Query parameter that selects a listing page.
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Currency label used when rendering prices.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Accept-Language header sent with every request.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

fn default_base_url() -> String {
    "https://www.falabella.com.pe".to_string()
}

fn default_product_token() -> String {
    "/product/".to_string()
}

fn default_search_url() -> String {
    "https://www.falabella.com.pe/falabella-pe/search?Ntt={query}".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_currency() -> String {
    "S/".to_string()
}

fn default_accept_language() -> String {
    "es-PE,es;q=0.9,en;q=0.8".to_string()
}

impl Default for Site {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            product_token: default_product_token(),
            search_url: default_search_url(),
            page_param: default_page_param(),
            currency: default_currency(),
            accept_language: default_accept_language(),
        }
    }
}

impl Site {
    /// Returns the base URL without a trailing slash.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns true if the URL points at a product page.
    pub fn is_product_url(&self, url: &str) -> bool {
        url.contains(&self.product_token)
    }

    /// Builds the URL of one listing page for a source.
    pub fn listing_url(&self, source: &Source, page: u32) -> String {
        let first = match source {
            Source::Search { query } => {
                self.search_url.replace("{query}", &urlencoding::encode(query))
            }
            Source::Category { url } | Source::Url { url } => url.clone(),
        };

        if page <= 1 || !source.is_paginated() {
            return first;
        }

        let separator = if first.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", first, separator, self.page_param, page)
    }
}

/// A configured entry point that a scan enumerates for candidate links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// Keyword search, paginated.
    Search { query: String },
    /// Category or collection listing, paginated.
    Category { url: String },
    /// A single listing URL, fetched once.
    Url { url: String },
}

impl Source {
    /// Returns whether further pages exist beyond the first.
    pub fn is_paginated(&self) -> bool {
        !matches!(self, Source::Url { .. })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Search { query } => write!(f, "search '{}'", query),
            Source::Category { url } => write!(f, "category {}", url),
            Source::Url { url } => write!(f, "url {}", url),
        }
    }
}
