//! Search orchestration module
//!
//! Fans a request out to every provider, merges the per-provider result
//! streams round-robin, and captures or restores the merged position as a
//! single opaque token.

mod aggregator;
mod iterator;
mod merge;
mod models;
mod token;

pub use aggregator::Aggregator;
pub use iterator::{EmptyIterator, ResultIterator, Token};
pub use merge::MergeIterator;
pub use models::SearchRequest;
pub use token::{MultiToken, ProviderToken};
