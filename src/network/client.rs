//! HTTP client for making requests to search providers

use super::request::{HttpMethod, HttpRequest, HttpResponse};
use super::user_agent::{accept_html, accept_json, accept_language, generate_user_agent};
use crate::config::OutgoingSettings;
use crate::error::{Result, SearchError};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// HTTP client wrapper shared by all providers
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    user_agent: String,
    extra_headers: HashMap<String, String>,
    debug: bool,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(settings.timeout())
            .pool_max_idle_per_host(settings.pool_maxsize)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        Ok(Self {
            client: builder.build()?,
            default_timeout: settings.timeout(),
            user_agent: generate_user_agent(),
            extra_headers: settings.extra_headers.clone(),
            debug: settings.debug_http,
        })
    }

    /// Copy of this client using a different per-request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            default_timeout: timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute a request, giving up as soon as `cancel` fires
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(SearchError::Canceled);
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("request canceled");
                Err(SearchError::Canceled)
            }
            res = self.send(request) => res,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        // later entries win: defaults, then settings, then the request itself
        let mut headers: HashMap<String, String> = HashMap::from([
            ("user-agent".to_string(), self.user_agent.clone()),
            ("accept".to_string(), accept_html().to_string()),
            ("accept-language".to_string(), accept_language(None)),
            ("dnt".to_string(), "1".to_string()),
        ]);
        for (key, value) in self.extra_headers.iter().chain(&request.headers) {
            headers.insert(key.to_ascii_lowercase(), value.clone());
        }

        req_builder = req_builder.timeout(self.default_timeout);
        for (key, value) in &headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(cookies) = request.cookie_header() {
            req_builder = req_builder.header("Cookie", cookies);
        }

        if let Some(ref form) = request.form {
            req_builder = req_builder.form(form);
        }

        if self.debug {
            debug!(method = ?request.method, url = %request.url, params = ?request.params, "http request");
        }

        let response = req_builder.send().await?;
        let response = Self::parse_response(response).await?;

        if self.debug {
            debug!(status = response.status, url = %response.url, bytes = response.text.len(), "http response");
            trace!(body = %response.text, "http response body");
        }
        Ok(response)
    }

    /// GET a JSON document, failing on non-2xx statuses
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        params: HashMap<String, String>,
    ) -> Result<T> {
        let request = HttpRequest::get(url)
            .params(params)
            .header("Accept", accept_json());
        self.execute(cancel, request)
            .await?
            .error_for_status()?
            .json()
    }

    /// GET an HTML page, failing on non-2xx statuses
    pub async fn get_html(
        &self,
        cancel: &CancellationToken,
        url: &str,
        params: HashMap<String, String>,
    ) -> Result<String> {
        let request = HttpRequest::get(url).params(params);
        Ok(self.execute(cancel, request).await?.error_for_status()?.text)
    }

    /// POST a form and return the HTML answer, failing on non-2xx statuses
    pub async fn post_form_html(
        &self,
        cancel: &CancellationToken,
        url: &str,
        form: HashMap<String, String>,
    ) -> Result<String> {
        let request = HttpRequest::post(url).form(form);
        Ok(self.execute(cancel, request).await?.error_for_status()?.text)
    }

    async fn parse_response(response: Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let text = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            text,
            url,
        })
    }

    /// Pick a new user agent
    pub fn rotate_user_agent(&mut self) {
        self.user_agent = generate_user_agent();
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
