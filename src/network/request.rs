//! Outgoing request and captured response types

use crate::error::{Result, SearchError};
use std::collections::HashMap;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request to be made on behalf of a provider
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// URL to request
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: HashMap<String, String>,
    /// Form body (POST only)
    pub form: Option<HashMap<String, String>>,
    pub cookies: HashMap<String, String>,
}

impl HttpRequest {
    fn with_method(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            params: HashMap::new(),
            form: None,
            cookies: HashMap::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Get)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Post)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replace the query parameters
    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Send form data (content-type form-urlencoded)
    pub fn form(mut self, data: HashMap<String, String>) -> Self {
        self.form = Some(data);
        self
    }

    /// Add a cookie
    pub fn cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(key.into(), value.into());
        self
    }

    /// Cookie header value, if any cookies are set
    pub(crate) fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<_> = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

/// HTTP response captured from upstream
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
    /// Final URL (after redirects)
    pub url: String,
}

impl HttpResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| SearchError::Parse(e.to_string()))
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the body looks like a bot-detection page
    pub fn is_captcha(&self) -> bool {
        self.text.contains("captcha")
            || self.text.contains("CAPTCHA")
            || self.text.contains("unusual traffic")
            || self.text.contains("automated requests")
    }

    /// Turn a non-2xx response into an error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SearchError::status(self.status))
        }
    }
}
