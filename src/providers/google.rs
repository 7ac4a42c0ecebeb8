//! Google web search provider (basic HTML interface)

use super::html::{query_value, selector, text};
use super::paged::{Page, PageSource, PagedIterator};
use super::traits::{Provider, ProviderAbout};
use crate::error::{Result, SearchError};
use crate::locales::{base_language, parse_lang_code, parse_region_code, Language, Region};
use crate::network::{HttpClient, HttpRequest};
use crate::results::{LinkResult, SearchResult};
use crate::search::{ResultIterator, SearchRequest};
use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

pub const PROVIDER_ID: &str = "google";

const DEFAULT_HOSTNAME: &str = "www.google.com";
const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_LANGUAGE: &str = "en";
const SEARCH_PATH: &str = "/search";
const PREFERENCES_PATH: &str = "/preferences";

/// Country code, local Google hostname, country name
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("AR", "www.google.com.ar", "Argentina"),
    ("AT", "www.google.at", "Austria"),
    ("AU", "www.google.com.au", "Australia"),
    ("BE", "www.google.be", "Belgium"),
    ("BG", "www.google.bg", "Bulgaria"),
    ("BR", "www.google.com.br", "Brazil"),
    ("CA", "www.google.ca", "Canada"),
    ("CH", "www.google.ch", "Switzerland"),
    ("CL", "www.google.cl", "Chile"),
    ("CZ", "www.google.cz", "Czech Republic"),
    ("DE", "www.google.de", "Germany"),
    ("DK", "www.google.dk", "Denmark"),
    ("EE", "www.google.ee", "Estonia"),
    ("ES", "www.google.es", "Spain"),
    ("FI", "www.google.fi", "Finland"),
    ("FR", "www.google.fr", "France"),
    ("GB", "www.google.co.uk", "United Kingdom"),
    ("GR", "www.google.gr", "Greece"),
    ("HK", "www.google.com.hk", "Hong Kong"),
    ("HR", "www.google.hr", "Croatia"),
    ("HU", "www.google.hu", "Hungary"),
    ("ID", "www.google.co.id", "Indonesia"),
    ("IE", "www.google.ie", "Ireland"),
    ("IL", "www.google.co.il", "Israel"),
    ("IN", "www.google.co.in", "India"),
    ("IT", "www.google.it", "Italy"),
    ("JP", "www.google.co.jp", "Japan"),
    ("KR", "www.google.co.kr", "South Korea"),
    ("LT", "www.google.lt", "Lithuania"),
    ("LV", "www.google.lv", "Latvia"),
    ("MX", "www.google.com.mx", "Mexico"),
    ("MY", "www.google.com.my", "Malaysia"),
    ("NL", "www.google.nl", "Netherlands"),
    ("NO", "www.google.no", "Norway"),
    ("NZ", "www.google.co.nz", "New Zealand"),
    ("PH", "www.google.com.ph", "Philippines"),
    ("PL", "www.google.pl", "Poland"),
    ("PT", "www.google.pt", "Portugal"),
    ("RO", "www.google.ro", "Romania"),
    ("RU", "www.google.ru", "Russia"),
    ("SE", "www.google.se", "Sweden"),
    ("SG", "www.google.com.sg", "Singapore"),
    ("SI", "www.google.si", "Slovenia"),
    ("SK", "www.google.sk", "Slovakia"),
    ("TH", "www.google.co.th", "Thailand"),
    ("TR", "www.google.com.tr", "Turkey"),
    ("TW", "www.google.com.tw", "Taiwan"),
    ("UA", "www.google.com.ua", "Ukraine"),
    ("US", "www.google.com", "United States"),
    ("ZA", "www.google.co.za", "South Africa"),
];

fn country_hostname(country: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(code, _, _)| *code == country)
        .map(|(_, host, _)| *host)
}

/// Google web search
#[derive(Clone)]
pub struct Google {
    id: String,
    client: HttpClient,
    base_url: Option<String>,
    use_local_domain: bool,
    languages: Arc<OnceCell<Vec<Language>>>,
}

/// Position in a Google result stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleCursor {
    #[serde(rename = "q")]
    pub query: String,
    #[serde(rename = "off")]
    pub offset: usize,
    #[serde(rename = "lang")]
    pub language: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe: Option<bool>,
}

impl Google {
    pub fn new(client: HttpClient) -> Self {
        Self {
            id: PROVIDER_ID.to_string(),
            client,
            base_url: None,
            use_local_domain: true,
            languages: Arc::new(OnceCell::new()),
        }
    }

    /// Register under a different ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Send every request to `url`, ignoring country hostnames
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Query the country's own Google domain (on by default)
    pub fn use_local_domain(mut self, enabled: bool) -> Self {
        self.use_local_domain = enabled;
        self
    }

    fn first_cursor(req: &SearchRequest) -> GoogleCursor {
        GoogleCursor {
            query: req.query.clone(),
            offset: 0,
            language: req
                .lang
                .as_ref()
                .map(base_language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            country: req
                .effective_region()
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            safe: req.safe_search,
        }
    }

    fn base_for(&self, country: &str) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        let host = if self.use_local_domain {
            country_hostname(country).unwrap_or(DEFAULT_HOSTNAME)
        } else {
            DEFAULT_HOSTNAME
        };
        format!("https://{}", host)
    }

    fn resolve(base: &str, href: &str) -> Option<Url> {
        let link = if href.starts_with("/url?") {
            query_value(href, "q")
                .filter(|target| target.starts_with("http"))
                .unwrap_or_else(|| href.to_string())
        } else {
            href.to_string()
        };
        if link.starts_with("http") {
            Url::parse(&link).ok()
        } else {
            Url::parse(base).ok()?.join(&link).ok()
        }
    }

    fn parse_results(base: &str, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let result_selector = selector("div.g")?;
        let title_selector = selector("h3")?;
        let link_selector = selector("a[href]")?;
        let snippet_selector = selector("div.VwiC3b, span.aCOpRe, span.st")?;

        let mut results = Vec::new();
        for element in document.select(&result_selector) {
            let Some(title) = element.select(&title_selector).next().map(text) else {
                continue;
            };
            let Some(href) = element
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            if href.starts_with(SEARCH_PATH) {
                continue;
            }
            let Some(url) = Self::resolve(base, href) else {
                debug!(href, "skipping result with unusable link");
                continue;
            };

            let mut result = LinkResult::new(url, title);
            if let Some(snippet) = element.select(&snippet_selector).next() {
                result = result.with_desc(text(snippet));
            }
            results.push(result.into());
        }
        Ok(results)
    }

    fn parse_languages(html: &str) -> Result<Vec<Language>> {
        let document = Html::parse_document(html);
        let input_selector = selector(r#"input[name="lang"]"#)?;
        let mut out = Vec::new();
        for input in document.select(&input_selector) {
            let (Some(id), Some(name)) = (input.value().attr("id"), input.value().attr("data-name"))
            else {
                continue;
            };
            // ids look like "_de" or "_zh-TW"
            let code = id.trim_start_matches('_');
            if code.is_empty() || name.is_empty() || code.starts_with("xx-") {
                continue;
            }
            out.push(Language::new(parse_lang_code(code)?, name));
        }
        if out.is_empty() {
            return Err(SearchError::Parse("cannot parse languages list".to_string()));
        }
        Ok(out)
    }
}

#[async_trait]
impl PageSource for Google {
    type Cursor = GoogleCursor;

    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
        cursor: &GoogleCursor,
    ) -> Result<Page<GoogleCursor>> {
        let base = self.base_for(&cursor.country);
        let mut request = HttpRequest::get(format!("{}{}", base, SEARCH_PATH))
            .param("q", cursor.query.as_str())
            .param("start", cursor.offset.to_string())
            .param("gws_rd", "cr")
            .param("gbv", "1")
            .param("lr", format!("lang_{}", cursor.language))
            .param("hl", cursor.language.as_str())
            .header(
                "Accept-Language",
                format!("{},{}-{}", cursor.language, cursor.language, cursor.country),
            );
        if let Some(safe) = cursor.safe {
            request = request.param("safe", if safe { "active" } else { "off" });
        }

        let response = self.client.execute(cancel, request).await?;
        if response.is_captcha() || response.url.contains("/sorry/") {
            return Err(SearchError::Blocked("google captcha".to_string()));
        }
        let response = response.error_for_status()?;

        let results = Self::parse_results(&base, &response.text)?;
        let next = (!results.is_empty()).then(|| GoogleCursor {
            offset: cursor.offset + results.len(),
            ..cursor.clone()
        });
        Ok(Page::new(results, next))
    }
}

#[async_trait]
impl Provider for Google {
    fn id(&self) -> &str {
        &self.id
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.google.com")
            .official_api(false)
            .results_format("HTML")
    }

    async fn languages(&self, cancel: &CancellationToken) -> Result<Vec<Language>> {
        let list = self
            .languages
            .get_or_try_init(|| async {
                let url = format!("{}{}", self.base_for(DEFAULT_COUNTRY), PREFERENCES_PATH);
                let html = self.client.get_html(cancel, &url, Default::default()).await?;
                Self::parse_languages(&html)
            })
            .await?;
        Ok(list.clone())
    }

    async fn regions(&self, _cancel: &CancellationToken) -> Result<Vec<Region>> {
        COUNTRIES
            .iter()
            .map(|(code, _, name)| Ok(Region::new(parse_region_code(code)?, *name)))
            .collect()
    }

    async fn search(&self, _cancel: &CancellationToken, req: &SearchRequest) -> Box<dyn ResultIterator> {
        Box::new(PagedIterator::new(self.clone(), Self::first_cursor(req)))
    }

    async fn continue_search(&self, cancel: &CancellationToken, token: &[u8]) -> Box<dyn ResultIterator> {
        Box::new(PagedIterator::resume(self.clone(), cancel, token).await)
    }
}
