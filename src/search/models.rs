//! Search request model

use crate::locales::{LangCode, RegionCode};

/// A search request, passed unchanged to every provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// The search query string
    pub query: String,
    /// Preferred result language
    pub lang: Option<LangCode>,
    /// Region to restrict results to
    pub region: Option<RegionCode>,
    /// Safe search override (None = provider default)
    pub safe_search: Option<bool>,
}

impl SearchRequest {
    /// Create a request for a query string
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set language
    pub fn with_lang(mut self, lang: LangCode) -> Self {
        self.lang = Some(lang);
        self
    }

    /// Set region
    pub fn with_region(mut self, region: RegionCode) -> Self {
        self.region = Some(region);
        self
    }

    /// Set safe search
    pub fn with_safe_search(mut self, enabled: bool) -> Self {
        self.safe_search = Some(enabled);
        self
    }

    /// Region from the explicit field, falling back to the language tag
    pub fn effective_region(&self) -> Option<RegionCode> {
        self.region
            .or_else(|| self.lang.as_ref().and_then(|l| l.region))
    }

    /// Check if query is empty
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}
