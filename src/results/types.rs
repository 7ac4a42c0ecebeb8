//! Result type definitions

use serde::{Deserialize, Serialize};
use url::Url;

/// An image reference with its pixel dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: Url,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl Thumbnail {
    pub fn new(url: Url, width: u32, height: u32) -> Self {
        Self { url, width, height }
    }
}

/// A plain web link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    /// Target URL
    pub url: Url,
    /// Result title
    pub title: String,
    /// Content snippet/description
    #[serde(default)]
    pub desc: String,
}

impl LinkResult {
    pub fn new(url: Url, title: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            desc: String::new(),
        }
    }

    /// Add a description
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }
}

/// An image, optionally linked to the page it was found on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    /// The full-size image
    pub image: Thumbnail,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Page that embeds the image
    pub page_url: Option<Url>,
    /// Smaller preview, if the provider returned one
    pub thumbnail: Option<Thumbnail>,
}

/// A video link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResult {
    #[serde(flatten)]
    pub link: LinkResult,
    pub thumbnail: Option<Thumbnail>,
}

/// A named entity (encyclopedia article, knowledge panel)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResult {
    #[serde(flatten)]
    pub link: LinkResult,
    /// Entity type, e.g. "person"
    pub kind: Option<String>,
    pub category: Option<String>,
    pub image: Option<Thumbnail>,
}

/// A single search result as produced by a provider.
///
/// The aggregator never looks inside; it only moves these values around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchResult {
    Link(LinkResult),
    Image(ImageResult),
    Video(VideoResult),
    Entity(EntityResult),
}

impl SearchResult {
    /// Primary URL of the result
    pub fn url(&self) -> &Url {
        match self {
            Self::Link(r) => &r.url,
            Self::Image(r) => &r.image.url,
            Self::Video(r) => &r.link.url,
            Self::Entity(r) => &r.link.url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Link(r) => &r.title,
            Self::Image(r) => &r.title,
            Self::Video(r) => &r.link.title,
            Self::Entity(r) => &r.link.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Link(r) => &r.desc,
            Self::Image(r) => &r.desc,
            Self::Video(r) => &r.link.desc,
            Self::Entity(r) => &r.link.desc,
        }
    }

    /// Preview image; an image result falls back to the image itself
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        match self {
            Self::Link(_) => None,
            Self::Image(r) => Some(r.thumbnail.as_ref().unwrap_or(&r.image)),
            Self::Video(r) => r.thumbnail.as_ref(),
            Self::Entity(r) => r.image.as_ref(),
        }
    }

    /// Short variant name, used for display
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Link(_) => "link",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Entity(_) => "entity",
        }
    }
}

impl From<LinkResult> for SearchResult {
    fn from(r: LinkResult) -> Self {
        Self::Link(r)
    }
}

impl From<EntityResult> for SearchResult {
    fn from(r: EntityResult) -> Self {
        Self::Entity(r)
    }
}
