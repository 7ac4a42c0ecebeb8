//! Fan-out search across every registered provider

use super::iterator::{ResultIterator, Token};
use super::merge::MergeIterator;
use super::models::SearchRequest;
use super::token::MultiToken;
use crate::autocomplete::{SuggestionMerger, Suggestions};
use crate::error::{Result, SearchError};
use crate::metrics::Metrics;
use crate::providers::ProviderRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Opened = Vec<(String, Box<dyn ResultIterator>)>;

/// Searches all providers of a registry and merges their results
pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<Metrics>,
}

impl Aggregator {
    /// Create an aggregator over a non-empty registry
    pub fn new(registry: Arc<ProviderRegistry>) -> Result<Self> {
        if registry.is_empty() {
            return Err(SearchError::NoProviders);
        }
        Ok(Self {
            registry,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Share a metrics collector instead of the aggregator's own
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Start `req` on every provider and merge the streams.
    ///
    /// Providers whose search fails to start are closed and left out; if
    /// none survive the merged stream is simply empty.
    pub async fn search(&self, cancel: &CancellationToken, req: &SearchRequest) -> MergeIterator {
        self.metrics.inc_search();

        let mut opened: Opened = Vec::with_capacity(self.registry.len());
        for provider in self.registry.iter() {
            let id = provider.id();
            let mut it = provider.search(cancel, req).await;
            self.metrics.record_provider_search(id);
            if let Some(err) = it.err().cloned() {
                warn!("provider {} failed to start: {}", id, err);
                self.metrics.record_error(id);
                close_quietly(id, &mut *it);
                continue;
            }
            opened.push((id.to_string(), it));
        }

        info!(
            "Searching {:?} on {} of {} providers",
            req.query,
            opened.len(),
            self.registry.len()
        );
        MergeIterator::new(opened).with_metrics(self.metrics.clone())
    }

    /// Resume a merged stream from a token produced by [`MergeIterator`].
    ///
    /// Resumption is all or nothing: an undecodable token, an unknown
    /// provider ID or any provider failing to resume yields an iterator
    /// carrying that error, after closing whatever was already reopened.
    pub async fn continue_search(&self, cancel: &CancellationToken, token: &Token) -> MergeIterator {
        let tok = match MultiToken::decode(token) {
            Ok(tok) => tok,
            Err(err) => {
                warn!("cannot resume search: {}", err);
                return MergeIterator::failed(err);
            }
        };
        self.metrics.inc_search();

        let mut opened: Opened = Vec::with_capacity(tok.provs.len());
        for sub in tok.provs {
            let Some(provider) = self.registry.get(&sub.id) else {
                close_all(opened);
                return MergeIterator::failed(SearchError::UnknownProvider(sub.id));
            };
            let mut it = provider.continue_search(cancel, &sub.tok).await;
            self.metrics.record_provider_search(&sub.id);
            if let Some(err) = it.err().cloned() {
                warn!("provider {} failed to resume: {}", sub.id, err);
                self.metrics.record_error(&sub.id);
                close_quietly(&sub.id, &mut *it);
                close_all(opened);
                return MergeIterator::failed(err);
            }
            opened.push((sub.id, it));
        }

        debug!("Resumed search on {} providers", opened.len());
        MergeIterator::resumed(opened, tok.cur).with_metrics(self.metrics.clone())
    }

    /// Ask every autocomplete-capable provider for suggestions.
    ///
    /// Suggestions are de-duplicated, keeping the first occurrence in
    /// registration order. Failing providers do not stop the others; the
    /// last failure is reported next to whatever was collected.
    pub async fn auto_complete(&self, cancel: &CancellationToken, text: &str) -> Suggestions {
        let mut merger = SuggestionMerger::default();
        for (id, ac) in self.registry.autocompleters() {
            match ac.auto_complete(cancel, text).await {
                Ok(items) => {
                    debug!("provider {} suggested {} completions", id, items.len());
                    merger.extend(items);
                }
                Err(err) => {
                    warn!("provider {} autocomplete failed: {}", id, err);
                    merger.fail(err);
                }
            }
        }
        merger.finish()
    }
}

fn close_quietly(id: &str, it: &mut dyn ResultIterator) {
    if let Err(err) = it.close() {
        debug!("closing provider {} failed: {}", id, err);
    }
}

fn close_all(opened: Opened) {
    for (id, mut it) in opened {
        close_quietly(&id, &mut *it);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FixedProvider, Provider};

    fn registry(providers: Vec<Arc<dyn Provider>>) -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::from_providers(providers).unwrap())
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = Aggregator::new(Arc::new(ProviderRegistry::new())).err().unwrap();
        assert_eq!(err, SearchError::NoProviders);
    }

    #[tokio::test]
    async fn test_search_skips_failed_start() {
        let cancel = CancellationToken::new();
        let bad = Arc::new(FixedProvider::new("bad", vec![]).failing(SearchError::status(500)));
        let good = Arc::new(FixedProvider::from_titles("good", vec![vec!["g1"]]));
        let agg = Aggregator::new(registry(vec![bad.clone() as Arc<dyn Provider>, good])).unwrap();

        let mut it = agg.search(&cancel, &SearchRequest::new("q")).await;
        assert_eq!(it.provider_ids(), vec!["good"]);
        assert_eq!(bad.closed(), 1);
        assert!(it.next(&cancel).await);
        assert_eq!(it.result().unwrap().title(), "g1");
        assert!(!it.next(&cancel).await);
        assert!(it.err().is_none());
        assert_eq!(agg.metrics().get_provider_stats("bad").unwrap().errors, 1);
    }

    #[tokio::test]
    async fn test_all_providers_failing_yields_empty_stream() {
        let cancel = CancellationToken::new();
        let bad = Arc::new(FixedProvider::new("bad", vec![]).failing(SearchError::Canceled));
        let agg = Aggregator::new(registry(vec![bad as Arc<dyn Provider>])).unwrap();
        let mut it = agg.search(&cancel, &SearchRequest::new("q")).await;
        assert!(it.is_empty());
        assert!(!it.next(&cancel).await);
        assert!(it.err().is_none());
    }

    #[tokio::test]
    async fn test_continue_rejects_garbage_token() {
        let cancel = CancellationToken::new();
        let only = Arc::new(FixedProvider::new("a", vec![]));
        let agg = Aggregator::new(registry(vec![only as Arc<dyn Provider>])).unwrap();
        let mut it = agg
            .continue_search(&cancel, &Token::new(b"garbage".to_vec()))
            .await;
        assert!(matches!(it.err(), Some(SearchError::Token(_))));
        assert!(!it.next(&cancel).await);
    }

    #[tokio::test]
    async fn test_auto_complete_merges() {
        let cancel = CancellationToken::new();
        let agg = Aggregator::new(registry(vec![
            Arc::new(FixedProvider::new("a", vec![]).with_suggestions(vec!["solar", "solaris"]))
                as Arc<dyn Provider>,
            Arc::new(FixedProvider::new("plain", vec![])),
            Arc::new(FixedProvider::new("b", vec![]).with_suggestions(vec!["solar", "solar panel"])),
        ]))
        .unwrap();
        let out = agg.auto_complete(&cancel, "sol").await;
        assert_eq!(out.items, vec!["solar", "solaris", "solar panel"]);
        assert!(out.last_error.is_none());
    }
}
