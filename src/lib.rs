//! metasearch-rs: a metasearch core written in Rust
//!
//! Queries several search providers at once, interleaves their result
//! streams round-robin, and lets callers stop and later resume the merged
//! stream through a single opaque token.

pub mod autocomplete;
pub mod config;
pub mod error;
pub mod locales;
pub mod metrics;
pub mod network;
pub mod providers;
pub mod results;
pub mod search;

pub use autocomplete::{AutoComplete, Suggestions};
pub use config::Settings;
pub use error::{Result, SearchError};
pub use providers::{Provider, ProviderRegistry};
pub use results::SearchResult;
pub use search::{Aggregator, MergeIterator, ResultIterator, SearchRequest, Token};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for provider requests in seconds
pub const DEFAULT_TIMEOUT: u64 = 5;
