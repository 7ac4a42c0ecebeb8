//! Paged result iterator contract and the opaque continuation token

use crate::error::{Result, SearchError};
use crate::results::SearchResult;
use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Opaque continuation state.
///
/// Only the component that produced a token knows how to read it back.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(Vec<u8>);

impl Token {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Hex form, suitable for printing and copy-pasting
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse the hex form produced by [`Token::to_hex`]
    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| SearchError::Token(e.to_string()))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Token({})", s),
            Err(_) => write!(f, "Token(0x{})", self.to_hex()),
        }
    }
}

impl From<Vec<u8>> for Token {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A cursor over a paginated result stream.
///
/// `next_page` returning false is not an error by itself: callers check
/// [`ResultIterator::err`] to tell clean exhaustion from a failed fetch.
/// Every network-bound call receives the caller's cancellation handle.
#[async_trait]
pub trait ResultIterator: Send {
    /// Fetch the next page, dropping whatever is left of the current one.
    async fn next_page(&mut self, cancel: &CancellationToken) -> bool;

    /// Number of fetched items not yet consumed
    fn buffered(&self) -> usize;

    /// Advance to the next item, fetching a page only if none is buffered.
    async fn next(&mut self, cancel: &CancellationToken) -> bool;

    /// Item at the current position, if any
    fn result(&self) -> Option<&SearchResult>;

    /// Capture resumable state.
    ///
    /// `Ok(None)` means there is nothing left to resume. An error is also
    /// retained in the iterator's error state. A merged iterator whose
    /// providers fail to produce a sub-token returns no token at all, not a
    /// partial one covering the healthy providers.
    fn token(&mut self) -> Result<Option<Token>>;

    /// Error state, if the iterator failed
    fn err(&self) -> Option<&SearchError>;

    /// Release resources; later `next` calls return false.
    fn close(&mut self) -> Result<()>;
}

/// An iterator with no results, optionally carrying an error.
///
/// Providers return a failed `EmptyIterator` when a search cannot start.
#[derive(Debug, Default)]
pub struct EmptyIterator {
    err: Option<SearchError>,
}

impl EmptyIterator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(err: SearchError) -> Self {
        Self { err: Some(err) }
    }
}

#[async_trait]
impl ResultIterator for EmptyIterator {
    async fn next_page(&mut self, _cancel: &CancellationToken) -> bool {
        false
    }

    fn buffered(&self) -> usize {
        0
    }

    async fn next(&mut self, _cancel: &CancellationToken) -> bool {
        false
    }

    fn result(&self) -> Option<&SearchResult> {
        None
    }

    fn token(&mut self) -> Result<Option<Token>> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(None),
        }
    }

    fn err(&self) -> Option<&SearchError> {
        self.err.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
