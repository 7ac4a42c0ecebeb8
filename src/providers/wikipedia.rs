//! Wikipedia provider (MediaWiki API)

use super::paged::{Page, PageSource, PagedIterator};
use super::traits::{Provider, ProviderAbout};
use crate::autocomplete::{parse_opensearch, AutoComplete};
use crate::error::Result;
use crate::locales::{base_language, supported_languages, Language};
use crate::network::HttpClient;
use crate::results::{EntityResult, LinkResult, SearchResult, Thumbnail};
use crate::search::{ResultIterator, SearchRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const PROVIDER_ID: &str = "wikipedia";

const DEFAULT_LANGUAGE: &str = "en";
const PER_PAGE: usize = 10;
const THUMBNAIL_SIZE: u32 = 300;
const MAX_EXTRACT_CHARS: usize = 500;

/// Wikipedia article search
#[derive(Clone)]
pub struct Wikipedia {
    id: String,
    client: HttpClient,
    /// API endpoint, overrides the per-language wiki
    api_url: Option<String>,
    /// Wiki used for autocomplete
    default_language: String,
}

/// Position in a Wikipedia result stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikipediaCursor {
    #[serde(rename = "lang")]
    pub language: String,
    #[serde(rename = "q")]
    pub query: String,
    #[serde(rename = "off")]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<QueryResponse>,
    #[serde(rename = "continue", default)]
    continuation: Option<Continuation>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    gsroffset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    thumbnail: Option<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    source: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

impl Wikipedia {
    pub fn new(client: HttpClient) -> Self {
        Self {
            id: PROVIDER_ID.to_string(),
            client,
            api_url: None,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Register under a different ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Send every request to `url` instead of `https://<lang>.wikipedia.org/w/api.php`
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Wiki used for autocomplete
    pub fn with_default_language(mut self, lang: impl Into<String>) -> Self {
        self.default_language = lang.into();
        self
    }

    fn api_url(&self, language: &str) -> String {
        match &self.api_url {
            Some(url) => url.clone(),
            None => format!("https://{}.wikipedia.org/w/api.php", language),
        }
    }

    fn first_cursor(req: &SearchRequest) -> WikipediaCursor {
        WikipediaCursor {
            language: req
                .lang
                .as_ref()
                .map(base_language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            query: req.query.clone(),
            offset: 0,
        }
    }

    fn search_params(cursor: &WikipediaCursor) -> HashMap<String, String> {
        [
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
            ("generator", "search".to_string()),
            ("gsrsearch", cursor.query.clone()),
            ("gsrlimit", PER_PAGE.to_string()),
            ("gsroffset", cursor.offset.to_string()),
            ("prop", "extracts|pageimages|info".to_string()),
            ("inprop", "url".to_string()),
            ("exintro", "1".to_string()),
            ("explaintext", "1".to_string()),
            ("exlimit", "max".to_string()),
            ("pithumbsize", THUMBNAIL_SIZE.to_string()),
            ("redirects", "1".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn article_url(language: &str, title: &str) -> Option<Url> {
        let id = title.replace(' ', "_");
        Url::parse(&format!(
            "https://{}.wikipedia.org/wiki/{}",
            language,
            urlencoding::encode(&id)
        ))
        .ok()
    }

    fn convert(language: &str, mut pages: Vec<ApiPage>) -> Vec<SearchResult> {
        pages.sort_by_key(|p| p.index);
        pages
            .into_iter()
            .filter_map(|page| {
                let url = page
                    .fullurl
                    .as_deref()
                    .and_then(|u| Url::parse(u).ok())
                    .or_else(|| Self::article_url(language, &page.title))?;
                let desc = page
                    .extract
                    .map(|e| truncate_chars(e.trim(), MAX_EXTRACT_CHARS))
                    .unwrap_or_default();
                let image = page.thumbnail.and_then(|t| {
                    Url::parse(&t.source)
                        .ok()
                        .map(|u| Thumbnail::new(u, t.width, t.height))
                });
                Some(SearchResult::Entity(EntityResult {
                    link: LinkResult::new(url, page.title).with_desc(desc),
                    kind: None,
                    category: Some("encyclopedia".to_string()),
                    image,
                }))
            })
            .collect()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[async_trait]
impl PageSource for Wikipedia {
    type Cursor = WikipediaCursor;

    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
        cursor: &WikipediaCursor,
    ) -> Result<Page<WikipediaCursor>> {
        let url = self.api_url(&cursor.language);
        let resp: ApiResponse = self
            .client
            .get_json(cancel, &url, Self::search_params(cursor))
            .await?;

        let pages = resp.query.map(|q| q.pages).unwrap_or_default();
        let results = Self::convert(&cursor.language, pages);
        let next = resp
            .continuation
            .and_then(|c| c.gsroffset)
            .filter(|&offset| offset > cursor.offset)
            .map(|offset| WikipediaCursor {
                offset,
                ..cursor.clone()
            });
        Ok(Page::new(results, next))
    }
}

#[async_trait]
impl Provider for Wikipedia {
    fn id(&self) -> &str {
        &self.id
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.wikipedia.org")
            .official_api(true)
            .results_format("JSON")
    }

    async fn languages(&self, _cancel: &CancellationToken) -> Result<Vec<Language>> {
        Ok(supported_languages())
    }

    async fn search(&self, _cancel: &CancellationToken, req: &SearchRequest) -> Box<dyn ResultIterator> {
        Box::new(PagedIterator::new(self.clone(), Self::first_cursor(req)))
    }

    async fn continue_search(&self, cancel: &CancellationToken, token: &[u8]) -> Box<dyn ResultIterator> {
        Box::new(PagedIterator::resume(self.clone(), cancel, token).await)
    }

    fn as_autocomplete(&self) -> Option<&dyn AutoComplete> {
        Some(self)
    }
}

#[async_trait]
impl AutoComplete for Wikipedia {
    async fn auto_complete(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<String>> {
        let params: HashMap<String, String> = [
            ("action", "opensearch"),
            ("format", "json"),
            ("formatversion", "2"),
            ("namespace", "0"),
            ("limit", "10"),
            ("search", text),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let url = self.api_url(&self.default_language);
        let value: serde_json::Value = self.client.get_json(cancel, &url, params).await?;
        parse_opensearch(&value)
    }
}
