//! Provider traits and descriptive types

use crate::autocomplete::AutoComplete;
use crate::error::Result;
use crate::locales::{Language, Region};
use crate::search::{ResultIterator, SearchRequest};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A search backend able to start and resume paged searches
///
/// Neither `search` nor `continue_search` returns an error directly: a
/// provider that cannot start hands back an iterator whose `err()` is set,
/// and callers probe it before use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, unique within a registry and embedded in tokens
    fn id(&self) -> &str;

    /// Short description of the provider
    fn about(&self) -> ProviderAbout {
        ProviderAbout::default()
    }

    /// Languages the provider can search in
    async fn languages(&self, _cancel: &CancellationToken) -> Result<Vec<Language>> {
        Ok(Vec::new())
    }

    /// Regions the provider can search in
    async fn regions(&self, _cancel: &CancellationToken) -> Result<Vec<Region>> {
        Ok(Vec::new())
    }

    /// Start a new search
    async fn search(
        &self,
        cancel: &CancellationToken,
        req: &SearchRequest,
    ) -> Box<dyn ResultIterator>;

    /// Resume a search from a token previously produced by one of this
    /// provider's iterators
    async fn continue_search(
        &self,
        cancel: &CancellationToken,
        token: &[u8],
    ) -> Box<dyn ResultIterator>;

    /// Autocomplete capability, if the provider has one
    fn as_autocomplete(&self) -> Option<&dyn AutoComplete> {
        None
    }
}

/// Descriptive information about a provider
#[derive(Debug, Clone, Default)]
pub struct ProviderAbout {
    /// Website URL
    pub website: Option<String>,
    /// Whether it uses the official API
    pub use_official_api: bool,
    /// Result format (HTML, JSON)
    pub results: String,
}

impl ProviderAbout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn official_api(mut self, official: bool) -> Self {
        self.use_official_api = official;
        self
    }

    pub fn results_format(mut self, format: impl Into<String>) -> Self {
        self.results = format.into();
        self
    }
}
