//! Search providers
//!
//! Each provider knows how to query one upstream and how to page through
//! and resume its result stream.

pub mod duckduckgo;
mod fixed;
pub mod google;
mod html;
mod loader;
mod paged;
mod registry;
mod traits;
pub mod wikipedia;

pub use duckduckgo::DuckDuckGo;
pub use fixed::FixedProvider;
pub use google::Google;
pub use loader::ProviderLoader;
pub use paged::{Page, PageSource, PagedIterator};
pub use registry::ProviderRegistry;
pub use traits::{Provider, ProviderAbout};
pub use wikipedia::Wikipedia;
