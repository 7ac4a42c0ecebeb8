//! Generic paged iterator shared by the HTTP providers
//!
//! A provider describes how to fetch one page for a cursor; [`PagedIterator`]
//! turns that into a full [`ResultIterator`] with buffering, error state and
//! resumable tokens. The token is `{"page": <cursor>, "off": <consumed>}`:
//! resuming re-fetches that page and skips the items already handed out.

use crate::error::{Result, SearchError};
use crate::results::SearchResult;
use crate::search::{ResultIterator, Token};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One fetched page and the cursor of the page after it
#[derive(Debug, Clone)]
pub struct Page<C> {
    pub results: Vec<SearchResult>,
    pub next: Option<C>,
}

impl<C> Page<C> {
    pub fn new(results: Vec<SearchResult>, next: Option<C>) -> Self {
        Self { results, next }
    }

    /// A page with nothing after it
    pub fn last(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            next: None,
        }
    }
}

/// Fetches single pages of a provider's result stream
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    /// Everything needed to fetch one page again later
    type Cursor: Serialize + DeserializeOwned + Clone + Send + Sync;

    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
        cursor: &Self::Cursor,
    ) -> Result<Page<Self::Cursor>>;
}

#[derive(Serialize, Deserialize)]
struct PageToken<C> {
    page: C,
    #[serde(default)]
    off: usize,
}

/// [`ResultIterator`] over any [`PageSource`]
pub struct PagedIterator<S: PageSource> {
    source: Option<S>,
    /// cursor of the page the next `next_page` fetches
    pending: Option<S::Cursor>,
    /// cursor of the buffered page
    current: Option<S::Cursor>,
    page: Vec<SearchResult>,
    consumed: usize,
    err: Option<SearchError>,
}

impl<S: PageSource> PagedIterator<S> {
    /// Iterator starting at `first`; nothing is fetched until asked
    pub fn new(source: S, first: S::Cursor) -> Self {
        Self {
            source: Some(source),
            pending: Some(first),
            current: None,
            page: Vec::new(),
            consumed: 0,
            err: None,
        }
    }

    /// Iterator that has already failed
    pub fn failed(err: SearchError) -> Self {
        Self {
            source: None,
            pending: None,
            current: None,
            page: Vec::new(),
            consumed: 0,
            err: Some(err),
        }
    }

    /// Rebuild an iterator from a token produced by [`ResultIterator::token`].
    ///
    /// The page named by the token is fetched right away so that fetch
    /// failures show up in `err()` before the iterator is used.
    pub async fn resume(source: S, cancel: &CancellationToken, token: &[u8]) -> Self {
        let tok: PageToken<S::Cursor> = match serde_json::from_slice(token) {
            Ok(tok) => tok,
            Err(e) => return Self::failed(SearchError::Token(e.to_string())),
        };
        let mut it = Self::new(source, tok.page);
        if it.next_page(cancel).await {
            it.consumed = tok.off.min(it.page.len());
        }
        it
    }

    fn fail(&mut self, err: SearchError) -> bool {
        self.page.clear();
        self.consumed = 0;
        self.err = Some(err);
        false
    }
}

#[async_trait]
impl<S: PageSource> ResultIterator for PagedIterator<S> {
    async fn next_page(&mut self, cancel: &CancellationToken) -> bool {
        if self.err.is_some() {
            return false;
        }
        let Some(cursor) = self.pending.take() else {
            self.page.clear();
            self.consumed = 0;
            return false;
        };
        if cancel.is_cancelled() {
            return self.fail(SearchError::Canceled);
        }
        let fetched = match &self.source {
            Some(source) => source.fetch_page(cancel, &cursor).await,
            None => return false,
        };
        match fetched {
            Ok(page) => {
                debug!(results = page.results.len(), more = page.next.is_some(), "fetched page");
                self.current = Some(cursor);
                self.pending = if page.results.is_empty() {
                    None
                } else {
                    page.next
                };
                self.page = page.results;
                self.consumed = 0;
                !self.page.is_empty()
            }
            Err(err) => self.fail(err),
        }
    }

    fn buffered(&self) -> usize {
        self.page.len() - self.consumed
    }

    async fn next(&mut self, cancel: &CancellationToken) -> bool {
        if self.err.is_some() || self.source.is_none() {
            return false;
        }
        if self.buffered() == 0 && !self.next_page(cancel).await {
            return false;
        }
        self.consumed += 1;
        true
    }

    fn result(&self) -> Option<&SearchResult> {
        self.consumed.checked_sub(1).and_then(|i| self.page.get(i))
    }

    fn token(&mut self) -> Result<Option<Token>> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.source.is_none() || (self.buffered() == 0 && self.pending.is_none()) {
            return Ok(None);
        }
        let tok = match &self.current {
            Some(page) => PageToken {
                page: page.clone(),
                off: self.consumed,
            },
            None => match &self.pending {
                Some(page) => PageToken {
                    page: page.clone(),
                    off: 0,
                },
                None => return Ok(None),
            },
        };
        match serde_json::to_vec(&tok) {
            Ok(data) => Ok(Some(Token::new(data))),
            Err(e) => {
                let err = SearchError::Token(e.to_string());
                self.err = Some(err.clone());
                Err(err)
            }
        }
    }

    fn err(&self) -> Option<&SearchError> {
        self.err.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.source = None;
        self.pending = None;
        self.page.clear();
        self.consumed = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::LinkResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use url::Url;

    #[derive(Clone)]
    struct Numbers {
        pages: Vec<usize>,
        fail_at: Option<usize>,
        fetches: Arc<AtomicUsize>,
    }

    impl Numbers {
        fn new(pages: Vec<usize>) -> Self {
            Self {
                pages,
                fail_at: None,
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    fn item(page: usize, i: usize) -> SearchResult {
        let url = Url::parse(&format!("https://example.com/{}/{}", page, i)).unwrap();
        LinkResult::new(url, format!("{}.{}", page, i)).into()
    }

    #[async_trait]
    impl PageSource for Numbers {
        type Cursor = usize;

        async fn fetch_page(&self, _cancel: &CancellationToken, cursor: &usize) -> Result<Page<usize>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(*cursor) {
                return Err(SearchError::status(503));
            }
            let Some(&n) = self.pages.get(*cursor) else {
                return Ok(Page::last(Vec::new()));
            };
            let results = (0..n).map(|i| item(*cursor, i)).collect();
            let next = (*cursor + 1 < self.pages.len()).then_some(*cursor + 1);
            Ok(Page::new(results, next))
        }
    }

    async fn drain(it: &mut dyn ResultIterator, cancel: &CancellationToken) -> Vec<String> {
        let mut out = Vec::new();
        while it.next(cancel).await {
            out.push(it.result().unwrap().title().to_string());
        }
        out
    }

    #[tokio::test]
    async fn test_iterates_all_pages() {
        let cancel = CancellationToken::new();
        let mut it = PagedIterator::new(Numbers::new(vec![2, 1]), 0);
        assert!(it.result().is_none());
        assert_eq!(drain(&mut it, &cancel).await, vec!["0.0", "0.1", "1.0"]);
        assert!(it.err().is_none());
        assert_eq!(it.token(), Ok(None));
    }

    #[tokio::test]
    async fn test_lazy_start() {
        let source = Numbers::new(vec![1]);
        let fetches = source.fetches.clone();
        let mut it = PagedIterator::new(source, 0);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(it.buffered(), 0);
        assert!(it.token().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_next_page_discards_rest() {
        let cancel = CancellationToken::new();
        let mut it = PagedIterator::new(Numbers::new(vec![3, 2]), 0);
        assert!(it.next_page(&cancel).await);
        assert_eq!(it.buffered(), 3);
        assert!(it.next(&cancel).await);
        assert!(it.next_page(&cancel).await);
        assert_eq!(it.buffered(), 2);
        assert!(!it.next_page(&cancel).await);
        assert_eq!(it.buffered(), 0);
        assert!(it.err().is_none());
    }

    #[tokio::test]
    async fn test_resume_mid_page() {
        let cancel = CancellationToken::new();
        let source = Numbers::new(vec![3, 2]);
        let mut it = PagedIterator::new(source.clone(), 0);
        assert!(it.next(&cancel).await);
        assert!(it.next(&cancel).await);
        let tok = it.token().unwrap().unwrap();
        let rest = drain(&mut it, &cancel).await;

        let mut resumed = PagedIterator::resume(source, &cancel, tok.as_bytes()).await;
        assert!(resumed.err().is_none());
        assert_eq!(resumed.buffered(), 1);
        assert_eq!(drain(&mut resumed, &cancel).await, rest);
        assert_eq!(rest, vec!["0.2", "1.0", "1.1"]);
    }

    #[tokio::test]
    async fn test_resume_at_page_end() {
        let cancel = CancellationToken::new();
        let source = Numbers::new(vec![1, 1]);
        let mut it = PagedIterator::new(source.clone(), 0);
        assert!(it.next(&cancel).await);
        let tok = it.token().unwrap().unwrap();
        let mut resumed = PagedIterator::resume(source, &cancel, tok.as_bytes()).await;
        assert_eq!(resumed.buffered(), 0);
        assert_eq!(drain(&mut resumed, &cancel).await, vec!["1.0"]);
    }

    #[tokio::test]
    async fn test_resume_bad_token() {
        let cancel = CancellationToken::new();
        let it = PagedIterator::resume(Numbers::new(vec![1]), &cancel, b"nope").await;
        assert!(matches!(it.err(), Some(SearchError::Token(_))));
    }

    #[tokio::test]
    async fn test_fetch_error_is_sticky() {
        let cancel = CancellationToken::new();
        let mut source = Numbers::new(vec![1, 1]);
        source.fail_at = Some(1);
        let mut it = PagedIterator::new(source, 0);
        assert!(it.next(&cancel).await);
        assert!(!it.next(&cancel).await);
        assert_eq!(it.err(), Some(&SearchError::status(503)));
        assert!(!it.next(&cancel).await);
        assert_eq!(it.token(), Err(SearchError::status(503)));
    }

    #[tokio::test]
    async fn test_canceled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut it = PagedIterator::new(Numbers::new(vec![1]), 0);
        assert!(!it.next(&cancel).await);
        assert_eq!(it.err(), Some(&SearchError::Canceled));
    }

    #[tokio::test]
    async fn test_close() {
        let cancel = CancellationToken::new();
        let mut it = PagedIterator::new(Numbers::new(vec![2]), 0);
        assert!(it.next(&cancel).await);
        assert!(it.close().is_ok());
        assert!(!it.next(&cancel).await);
        assert_eq!(it.token(), Ok(None));
        assert!(it.close().is_ok());
    }
}
