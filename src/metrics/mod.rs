//! Metrics collection module
//!
//! Tracks how each provider behaved inside merged streams: how often it was
//! queried, how many results it served and how it left the stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Metrics collector shared by an aggregator and its iterators
pub struct Metrics {
    /// Total merged searches (fresh and resumed)
    total_searches: AtomicU64,
    /// Per-provider counters
    providers: RwLock<HashMap<String, ProviderStats>>,
}

/// Statistics for a single provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// Searches started or resumed on this provider
    pub searches: u64,
    /// Results this provider served into merged streams
    pub results: u64,
    /// Times the provider was dropped because of an error
    pub errors: u64,
    /// Times the provider ran out of results
    pub exhausted: u64,
}

impl ProviderStats {
    /// Share of searches that ended without an error, in percent
    pub fn reliability(&self) -> f64 {
        if self.searches == 0 {
            100.0
        } else {
            let ok = self.searches.saturating_sub(self.errors);
            (ok as f64 / self.searches as f64) * 100.0
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            providers: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderStats>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderStats>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, provider: &str, f: impl FnOnce(&mut ProviderStats)) {
        let mut providers = self.write();
        f(providers.entry(provider.to_string()).or_default());
    }

    /// Increment total search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_search(&self, provider: &str) {
        self.update(provider, |s| s.searches += 1);
    }

    pub fn record_result(&self, provider: &str) {
        self.update(provider, |s| s.results += 1);
    }

    pub fn record_error(&self, provider: &str) {
        self.update(provider, |s| s.errors += 1);
    }

    pub fn record_exhausted(&self, provider: &str) {
        self.update(provider, |s| s.exhausted += 1);
    }

    pub fn get_total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    pub fn get_provider_stats(&self, provider: &str) -> Option<ProviderStats> {
        self.read().get(provider).cloned()
    }

    /// All provider statistics, sorted by provider ID
    pub fn snapshot(&self) -> Vec<(String, ProviderStats)> {
        let mut stats: Vec<_> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.record_provider_search("duckduckgo");
        metrics.record_result("duckduckgo");
        metrics.record_result("duckduckgo");
        metrics.record_exhausted("duckduckgo");

        assert_eq!(metrics.get_total_searches(), 1);
        let stats = metrics.get_provider_stats("duckduckgo").unwrap();
        assert_eq!(stats.results, 2);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.reliability(), 100.0);
        assert!(metrics.get_provider_stats("google").is_none());
    }

    #[test]
    fn test_reliability() {
        let metrics = Metrics::new();
        for _ in 0..4 {
            metrics.record_provider_search("google");
        }
        metrics.record_error("google");
        let stats = metrics.get_provider_stats("google").unwrap();
        assert_eq!(stats.reliability(), 75.0);
    }

    #[test]
    fn test_snapshot_sorted() {
        let metrics = Metrics::new();
        metrics.record_result("wikipedia");
        metrics.record_result("duckduckgo");
        let names: Vec<_> = metrics.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["duckduckgo", "wikipedia"]);
    }
}
