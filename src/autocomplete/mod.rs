//! Autocomplete capability for search suggestions
//!
//! Providers that can complete partial queries implement [`AutoComplete`];
//! the aggregator fans a prefix out to all of them and merges the answers.

use crate::error::{Result, SearchError};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Completion of a partial query
#[async_trait]
pub trait AutoComplete: Send + Sync {
    /// Suggestions for `text`, most relevant first
    async fn auto_complete(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<String>>;
}

/// Merged suggestions from several providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    /// Distinct suggestions, in provider order then in each provider's order
    pub items: Vec<String>,
    /// Last error reported by a provider, if any failed
    pub last_error: Option<SearchError>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Suggestions, or the last error if any provider failed
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.last_error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// Accumulates suggestions without duplicates, keeping first-seen order
#[derive(Debug, Default)]
pub(crate) struct SuggestionMerger {
    seen: HashSet<String>,
    out: Suggestions,
}

impl SuggestionMerger {
    pub(crate) fn extend(&mut self, items: Vec<String>) {
        for item in items {
            if self.seen.insert(item.clone()) {
                self.out.items.push(item);
            }
        }
    }

    pub(crate) fn fail(&mut self, err: SearchError) {
        self.out.last_error = Some(err);
    }

    pub(crate) fn finish(self) -> Suggestions {
        self.out
    }
}

/// Suggestions from an OpenSearch-style answer: `[query, [suggestions...], ...]`
pub fn parse_opensearch(json: &serde_json::Value) -> Result<Vec<String>> {
    let list = json
        .as_array()
        .and_then(|arr| arr.get(1))
        .and_then(|v| v.as_array())
        .ok_or_else(|| SearchError::Parse("unexpected suggestion format".to_string()))?;
    Ok(list
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect())
}
