//! Error types shared by providers, iterators and the aggregator.
//!
//! Errors are `Clone` because an iterator keeps its error state around and
//! hands out copies of it (for example when `token()` fails after the fact).

/// Errors produced while searching, resuming or completing queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The upstream answered with a non-2xx status.
    #[error("status: {status}")]
    HttpStatus { code: u16, status: String },

    /// The upstream served a bot-detection page instead of results.
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    /// The upstream response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A continuation token could not be encoded or decoded.
    #[error("invalid token: {0}")]
    Token(String),

    /// A token names a provider that is not registered.
    #[error("provider {0:?} is not defined")]
    UnknownProvider(String),

    /// Two providers were registered under the same ID.
    #[error("provider {0:?} is already registered")]
    DuplicateProvider(String),

    /// No providers were available to build an aggregator.
    #[error("none providers were selected")]
    NoProviders,

    /// The caller canceled the operation.
    #[error("search canceled")]
    Canceled,

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A language or region code could not be parsed.
    #[error("invalid locale code: {0:?}")]
    Locale(String),
}

impl SearchError {
    /// Build an HTTP status error from a response status code.
    pub fn status(code: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        Self::HttpStatus {
            code,
            status: format!("{} {}", code, reason).trim_end().to_string(),
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Convenience type alias for crate results.
pub type Result<T> = std::result::Result<T, SearchError>;
