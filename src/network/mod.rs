//! HTTP networking module
//!
//! Provides the HTTP client providers use to reach their upstreams.

mod client;
mod request;
mod user_agent;

pub use client::HttpClient;
pub use request::{HttpMethod, HttpRequest, HttpResponse};
pub use user_agent::{accept_language, generate_user_agent};
