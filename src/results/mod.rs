//! Result types produced by providers
//!
//! This module defines the polymorphic result value moved through the aggregator.

mod types;

pub use types::*;
