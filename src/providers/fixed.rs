//! In-memory provider serving a predetermined list of pages
//!
//! Useful for tests and offline runs: it ignores the query, can be told to
//! fail at a given page or to fail outright, and counts how many iterators
//! it handed out and how many `close` calls they received.

use super::paged::{Page, PageSource, PagedIterator};
use super::traits::{Provider, ProviderAbout};
use crate::autocomplete::AutoComplete;
use crate::error::{Result, SearchError};
use crate::results::{LinkResult, SearchResult};
use crate::search::{EmptyIterator, ResultIterator, SearchRequest, Token};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Clone)]
struct FixedPages {
    pages: Arc<Vec<Vec<SearchResult>>>,
    fail_at: Option<usize>,
}

#[async_trait]
impl PageSource for FixedPages {
    type Cursor = usize;

    async fn fetch_page(&self, _cancel: &CancellationToken, cursor: &usize) -> Result<Page<usize>> {
        if self.fail_at == Some(*cursor) {
            return Err(SearchError::Http(format!("page {} unavailable", cursor)));
        }
        let results = self.pages.get(*cursor).cloned().unwrap_or_default();
        let next = (*cursor + 1 < self.pages.len()).then_some(*cursor + 1);
        Ok(Page::new(results, next))
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Provider backed by pages held in memory
pub struct FixedProvider {
    id: String,
    source: FixedPages,
    start_error: Option<SearchError>,
    suggestions: Option<Result<Vec<String>>>,
    counters: Arc<Counters>,
}

impl FixedProvider {
    pub fn new(id: impl Into<String>, pages: Vec<Vec<SearchResult>>) -> Self {
        Self {
            id: id.into(),
            source: FixedPages {
                pages: Arc::new(pages),
                fail_at: None,
            },
            start_error: None,
            suggestions: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Pages of link results titled by `pages`, at `https://<id>.example/<title>`
    pub fn from_titles(id: impl Into<String>, pages: Vec<Vec<&str>>) -> Self {
        let id = id.into();
        let pages = pages
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .filter_map(|title| {
                        let url = Url::parse(&format!("https://{}.example/{}", id, title)).ok()?;
                        Some(LinkResult::new(url, title).into())
                    })
                    .collect()
            })
            .collect();
        Self::new(id, pages)
    }

    /// Fail when fetching page `index` (zero-based)
    pub fn with_error_at(mut self, index: usize) -> Self {
        self.source.fail_at = Some(index);
        self
    }

    /// Fail every search and resumption before producing anything
    pub fn failing(mut self, err: SearchError) -> Self {
        self.start_error = Some(err);
        self
    }

    /// Answer autocomplete requests with `items`
    pub fn with_suggestions(mut self, items: Vec<&str>) -> Self {
        self.suggestions = Some(Ok(items.into_iter().map(String::from).collect()));
        self
    }

    /// Answer autocomplete requests with `err`
    pub fn with_suggestion_error(mut self, err: SearchError) -> Self {
        self.suggestions = Some(Err(err));
        self
    }

    /// Iterators handed out so far
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// `close` calls received by those iterators
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    fn track(&self, inner: Box<dyn ResultIterator>) -> Box<dyn ResultIterator> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(Tracked {
            inner,
            counters: self.counters.clone(),
        })
    }
}

#[async_trait]
impl Provider for FixedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new().results_format("memory")
    }

    async fn search(&self, _cancel: &CancellationToken, _req: &SearchRequest) -> Box<dyn ResultIterator> {
        match &self.start_error {
            Some(err) => self.track(Box::new(EmptyIterator::failed(err.clone()))),
            None => self.track(Box::new(PagedIterator::new(self.source.clone(), 0))),
        }
    }

    async fn continue_search(&self, cancel: &CancellationToken, token: &[u8]) -> Box<dyn ResultIterator> {
        match &self.start_error {
            Some(err) => self.track(Box::new(EmptyIterator::failed(err.clone()))),
            None => {
                let it = PagedIterator::resume(self.source.clone(), cancel, token).await;
                self.track(Box::new(it))
            }
        }
    }

    fn as_autocomplete(&self) -> Option<&dyn AutoComplete> {
        self.suggestions.as_ref().map(|_| self as &dyn AutoComplete)
    }
}

#[async_trait]
impl AutoComplete for FixedProvider {
    async fn auto_complete(&self, _cancel: &CancellationToken, _text: &str) -> Result<Vec<String>> {
        self.suggestions.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct Tracked {
    inner: Box<dyn ResultIterator>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ResultIterator for Tracked {
    async fn next_page(&mut self, cancel: &CancellationToken) -> bool {
        self.inner.next_page(cancel).await
    }

    fn buffered(&self) -> usize {
        self.inner.buffered()
    }

    async fn next(&mut self, cancel: &CancellationToken) -> bool {
        self.inner.next(cancel).await
    }

    fn result(&self) -> Option<&SearchResult> {
        self.inner.result()
    }

    fn token(&mut self) -> Result<Option<Token>> {
        self.inner.token()
    }

    fn err(&self) -> Option<&SearchError> {
        self.inner.err()
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}
