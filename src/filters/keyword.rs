//! Keyword-based title filtering.

use super::Filter;
use crate::shop::Offer;

/// Filters offers by keywords in the title.
///
/// Matching ignores case and common Spanish accents, so `television` also
/// matches "Televisión".
pub struct KeywordFilter {
    /// Keywords that must appear in the title.
    required: Vec<String>,
    /// Keywords that must NOT appear in the title.
    excluded: Vec<String>,
}

impl KeywordFilter {
    /// Creates a new keyword filter.
    pub fn new(required: Vec<String>, excluded: Vec<String>) -> Self {
        Self {
            required: required.iter().map(|k| fold(k)).collect(),
            excluded: excluded.iter().map(|k| fold(k)).collect(),
        }
    }

    /// Creates a filter with only required keywords.
    pub fn required(keywords: Vec<String>) -> Self {
        Self::new(keywords, Vec::new())
    }

    /// Creates a filter with only excluded keywords.
    pub fn excluded(keywords: Vec<String>) -> Self {
        Self::new(Vec::new(), keywords)
    }
}

/// Lowercases and strips accents from Latin vowels and `ñ`.
fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

impl Filter for KeywordFilter {
    fn matches(&self, offer: &Offer) -> bool {
        let title = fold(&offer.title);

        // All required keywords must be present
        if !self.required.iter().all(|k| title.contains(k.as_str())) {
            return false;
        }

        !self.excluded.iter().any(|k| title.contains(k.as_str()))
    }

    fn description(&self) -> String {
        let mut parts = Vec::new();

        if !self.required.is_empty() {
            parts.push(format!("Must contain: {}", self.required.join(", ")));
        }

        if !self.excluded.is_empty() {
            parts.push(format!("Must not contain: {}", self.excluded.join(", ")));
        }

        if parts.is_empty() {
            "Keywords: any".to_string()
        } else {
            parts.join("; ")
        }
    }
}
