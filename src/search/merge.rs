//! Round-robin merge of several provider iterators
//!
//! Providers are served in rotating order within a page, and pages advance
//! for all providers together. A provider that fails or runs dry is dropped
//! from the rotation; its error is logged, never surfaced to the caller.

use super::iterator::{ResultIterator, Token};
use super::token::MultiToken;
use crate::error::{Result, SearchError};
use crate::metrics::Metrics;
use crate::results::SearchResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A live provider iterator and the ID it was opened under
struct Binding {
    id: String,
    iter: Box<dyn ResultIterator>,
}

/// Merges the result streams of several providers into one.
///
/// The merge owns every provider iterator handed to it. An iterator leaves
/// the merge when it is exhausted, when it fails, or on [`close`].
///
/// [`close`]: ResultIterator::close
pub struct MergeIterator {
    bindings: Vec<Binding>,
    /// Provider that served the last result; `None` before the first one
    cur: Option<usize>,
    err: Option<SearchError>,
    metrics: Option<Arc<Metrics>>,
}

impl MergeIterator {
    /// Merge freshly started provider iterators, in the given order.
    pub fn new(providers: Vec<(String, Box<dyn ResultIterator>)>) -> Self {
        Self {
            bindings: providers
                .into_iter()
                .map(|(id, iter)| Binding { id, iter })
                .collect(),
            cur: None,
            err: None,
            metrics: None,
        }
    }

    /// Merge resumed iterators; `next` is the index that serves first.
    pub(crate) fn resumed(providers: Vec<(String, Box<dyn ResultIterator>)>, next: usize) -> Self {
        let mut it = Self::new(providers);
        it.cur = next.checked_sub(1);
        it
    }

    /// An iterator that yields nothing and reports `err`
    pub fn failed(err: SearchError) -> Self {
        Self {
            bindings: Vec::new(),
            cur: None,
            err: Some(err),
            metrics: None,
        }
    }

    /// Report provider activity to a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// IDs of the providers still in the rotation
    pub fn provider_ids(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.id.as_str()).collect()
    }

    /// Number of providers still in the rotation
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Remove a provider that returned false, logging why it stopped.
    fn drop_provider(&mut self, i: usize) {
        let mut b = self.bindings.remove(i);
        match b.iter.err() {
            Some(err) => {
                warn!("provider {} dropped: {}", b.id, err);
                if let Some(m) = &self.metrics {
                    m.record_error(&b.id);
                }
            }
            None => {
                debug!("provider {} exhausted", b.id);
                if let Some(m) = &self.metrics {
                    m.record_exhausted(&b.id);
                }
            }
        }
        if let Err(err) = b.iter.close() {
            debug!("closing provider {} failed: {}", b.id, err);
        }
    }

    /// Index that follows the cursor, wrapping around the live providers.
    fn advance(&self) -> usize {
        match self.cur {
            Some(i) if i + 1 < self.bindings.len() => i + 1,
            _ => 0,
        }
    }
}

#[async_trait]
impl ResultIterator for MergeIterator {
    async fn next_page(&mut self, cancel: &CancellationToken) -> bool {
        self.cur = None;
        let mut i = 0;
        while i < self.bindings.len() {
            if self.bindings[i].iter.next_page(cancel).await {
                i += 1;
            } else {
                self.drop_provider(i);
            }
        }
        !self.bindings.is_empty()
    }

    fn buffered(&self) -> usize {
        self.bindings.iter().map(|b| b.iter.buffered()).sum()
    }

    async fn next(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            if self.err.is_some() || self.bindings.is_empty() {
                return false;
            }
            if self.buffered() == 0 {
                let refilled = self.next_page(cancel).await;
                if !refilled || self.buffered() == 0 {
                    return false;
                }
            }
            // One pass over the rotation: skips count as tried, removals
            // shrink the rotation instead.
            let mut tried = 0;
            while tried < self.bindings.len() {
                let i = self.advance();
                self.cur = Some(i);
                if self.bindings[i].iter.buffered() == 0 {
                    tried += 1;
                    continue;
                }
                if self.bindings[i].iter.next(cancel).await {
                    if let Some(m) = &self.metrics {
                        m.record_result(&self.bindings[i].id);
                    }
                    return true;
                }
                self.drop_provider(i);
                self.cur = i.checked_sub(1);
            }
            // Nothing buffered anywhere any more; refill on the next round.
        }
    }

    fn result(&self) -> Option<&SearchResult> {
        self.cur
            .and_then(|i| self.bindings.get(i))
            .and_then(|b| b.iter.result())
    }

    fn token(&mut self) -> Result<Option<Token>> {
        if self.bindings.is_empty() {
            return Ok(None);
        }
        // At a page boundary the next refill restarts the rotation.
        let at_boundary = self.buffered() == 0;

        let mut tok = MultiToken::default();
        let mut next = None;
        let mut failure = None;
        for (i, b) in self.bindings.iter_mut().enumerate() {
            match b.iter.token() {
                Ok(Some(t)) => tok.push(b.id.clone(), t),
                Ok(None) => {}
                Err(err) => {
                    warn!("provider {} cannot produce a token: {}", b.id, err);
                    failure = Some(err);
                }
            }
            if self.cur == Some(i) {
                next = Some(tok.provs.len());
            }
        }
        if let Some(err) = failure {
            self.err = Some(err.clone());
            return Err(err);
        }
        if tok.provs.is_empty() {
            return Ok(None);
        }
        tok.cur = match next {
            Some(n) if !at_boundary && n < tok.provs.len() => n,
            _ => 0,
        };
        match tok.encode() {
            Ok(t) => Ok(Some(t)),
            Err(err) => {
                self.err = Some(err.clone());
                Err(err)
            }
        }
    }

    fn err(&self) -> Option<&SearchError> {
        self.err.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        let mut first = None;
        for mut b in self.bindings.drain(..) {
            if let Err(err) = b.iter.close() {
                debug!("closing provider {} failed: {}", b.id, err);
                first.get_or_insert(err);
            }
        }
        self.cur = None;
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::LinkResult;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// One page of scripted outcomes; `None` makes that `next` call fail.
    type Page = Vec<Option<&'static str>>;

    struct Scripted {
        pages: VecDeque<Page>,
        page: VecDeque<Option<&'static str>>,
        current: Option<SearchResult>,
        err: Option<SearchError>,
        /// Returned by `token` instead of a sub-token
        token_err: Option<SearchError>,
        sub_token: Option<Token>,
        closed: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(pages: Vec<Page>, closed: &Arc<AtomicUsize>) -> Self {
            Self {
                pages: pages.into(),
                page: VecDeque::new(),
                current: None,
                err: None,
                token_err: None,
                sub_token: None,
                closed: closed.clone(),
            }
        }

        fn boxed(pages: Vec<Page>, closed: &Arc<AtomicUsize>) -> Box<dyn ResultIterator> {
            Box::new(Self::new(pages, closed))
        }
    }

    fn link(title: &str) -> SearchResult {
        let url = Url::parse(&format!("https://example.com/{}", title)).unwrap();
        LinkResult::new(url, title).into()
    }

    #[async_trait]
    impl ResultIterator for Scripted {
        async fn next_page(&mut self, _cancel: &CancellationToken) -> bool {
            match self.pages.pop_front() {
                Some(p) => {
                    self.page = p.into();
                    true
                }
                None => {
                    self.page.clear();
                    false
                }
            }
        }

        fn buffered(&self) -> usize {
            self.page.len()
        }

        async fn next(&mut self, cancel: &CancellationToken) -> bool {
            if self.page.is_empty() && !self.next_page(cancel).await {
                return false;
            }
            match self.page.pop_front().flatten() {
                Some(title) => {
                    self.current = Some(link(title));
                    true
                }
                None => {
                    self.err = Some(SearchError::Http("connection reset".into()));
                    false
                }
            }
        }

        fn result(&self) -> Option<&SearchResult> {
            self.current.as_ref()
        }

        fn token(&mut self) -> Result<Option<Token>> {
            match &self.token_err {
                Some(err) => Err(err.clone()),
                None => Ok(self.sub_token.clone()),
            }
        }

        fn err(&self) -> Option<&SearchError> {
            self.err.as_ref()
        }

        fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn drain(it: &mut MergeIterator) -> Vec<String> {
        let cancel = CancellationToken::new();
        let mut out = Vec::new();
        while it.next(&cancel).await {
            out.push(it.result().unwrap().title().to_string());
        }
        out
    }

    #[tokio::test]
    async fn test_round_robin_within_page() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1"), Some("a2")]], &closed)),
            (
                "b".into(),
                Scripted::boxed(vec![vec![Some("b1"), Some("b2"), Some("b3")]], &closed),
            ),
        ]);
        assert_eq!(drain(&mut it).await, vec!["a1", "b1", "a2", "b2", "b3"]);
        assert!(it.err().is_none());
        assert!(it.is_empty());
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pages_advance_together() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            (
                "a".into(),
                Scripted::boxed(vec![vec![Some("a1")], vec![Some("a2")]], &closed),
            ),
            (
                "b".into(),
                Scripted::boxed(vec![vec![Some("b1"), Some("b2")], vec![Some("b3")]], &closed),
            ),
        ]);
        assert_eq!(drain(&mut it).await, vec!["a1", "b1", "b2", "a2", "b3"]);
    }

    #[tokio::test]
    async fn test_failed_provider_is_dropped() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1"), None]], &closed)),
            ("b".into(), Scripted::boxed(vec![vec![Some("b1"), Some("b2")]], &closed)),
        ]);
        assert_eq!(drain(&mut it).await, vec!["a1", "b1", "b2"]);
        assert!(it.err().is_none());
    }

    #[tokio::test]
    async fn test_last_buffered_provider_failing_refills() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![None]], &closed)),
            (
                "b".into(),
                Scripted::boxed(vec![vec![], vec![Some("b1")]], &closed),
            ),
        ]);
        assert_eq!(drain(&mut it).await, vec!["b1"]);
    }

    #[tokio::test]
    async fn test_next_page_drops_finished_providers() {
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1")]], &closed)),
            ("b".into(), Scripted::boxed(vec![], &closed)),
            ("c".into(), Scripted::boxed(vec![vec![Some("c1"), Some("c2")]], &closed)),
        ]);
        assert!(it.next_page(&cancel).await);
        assert_eq!(it.provider_ids(), vec!["a", "c"]);
        assert_eq!(it.buffered(), 3);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!it.next_page(&cancel).await);
        assert!(it.is_empty());
    }

    #[tokio::test]
    async fn test_result_before_first_next() {
        let closed = Arc::new(AtomicUsize::new(0));
        let it = MergeIterator::new(vec![(
            "a".into(),
            Scripted::boxed(vec![vec![Some("a1")]], &closed),
        )]);
        assert!(it.result().is_none());
    }

    #[tokio::test]
    async fn test_close_closes_each_provider_once() {
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1")]], &closed)),
            ("b".into(), Scripted::boxed(vec![vec![Some("b1")]], &closed)),
        ]);
        assert!(it.next(&cancel).await);
        assert!(it.close().is_ok());
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert!(!it.next(&cancel).await);
        assert!(it.close().is_ok());
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert_eq!(it.token(), Ok(None));
    }

    #[tokio::test]
    async fn test_failed_iterator() {
        let cancel = CancellationToken::new();
        let mut it = MergeIterator::failed(SearchError::UnknownProvider("x".into()));
        assert!(!it.next(&cancel).await);
        assert!(it.is_empty());
        assert_eq!(it.err(), Some(&SearchError::UnknownProvider("x".into())));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let closed = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(Metrics::new());
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1"), None]], &closed)),
            ("b".into(), Scripted::boxed(vec![vec![Some("b1")]], &closed)),
        ])
        .with_metrics(metrics.clone());
        drain(&mut it).await;

        let a = metrics.get_provider_stats("a").unwrap();
        assert_eq!((a.results, a.errors, a.exhausted), (1, 1, 0));
        let b = metrics.get_provider_stats("b").unwrap();
        assert_eq!((b.results, b.errors, b.exhausted), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_token_failure_sets_error() {
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let broken = Scripted {
            token_err: Some(SearchError::Http("boom".into())),
            ..Scripted::new(vec![vec![Some("b1"), Some("b2")]], &closed)
        };
        let mut it = MergeIterator::new(vec![
            ("a".into(), Scripted::boxed(vec![vec![Some("a1"), Some("a2")]], &closed)),
            ("b".into(), Box::new(broken)),
        ]);
        assert!(it.next(&cancel).await);
        assert!(it.err().is_none());

        assert_eq!(it.token(), Err(SearchError::Http("boom".into())));
        assert_eq!(it.err(), Some(&SearchError::Http("boom".into())));
        assert!(!it.next(&cancel).await);
        assert_eq!(it.provider_ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_token_cursor_names_next_provider() {
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let resumable = |id: &'static str| {
            let page = vec![Some(id), Some(id)];
            let it = Scripted {
                sub_token: Some(Token::new(id.as_bytes().to_vec())),
                ..Scripted::new(vec![page], &closed)
            };
            (id.to_string(), Box::new(it) as Box<dyn ResultIterator>)
        };
        let mut it = MergeIterator::new(vec![resumable("a"), resumable("b"), resumable("c")]);

        let mut cursors = Vec::new();
        for _ in 0..3 {
            assert!(it.next(&cancel).await);
            let tok = MultiToken::decode(&it.token().unwrap().unwrap()).unwrap();
            assert_eq!(tok.provs.len(), 3);
            cursors.push(tok.cur);
        }
        assert_eq!(cursors, vec![1, 2, 0]);
    }
}
