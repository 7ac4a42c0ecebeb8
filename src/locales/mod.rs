//! Language and region codes
//!
//! Requests carry optional BCP 47 language tags and ISO 3166 region codes.
//! Providers translate them into whatever their upstream expects.

use crate::error::{Result, SearchError};
use unic_langid::subtags;
use unic_langid::LanguageIdentifier;

/// A BCP 47 language tag such as `de-DE`
pub type LangCode = LanguageIdentifier;

/// An ISO 3166-1 alpha-2 region such as `DE`
pub type RegionCode = subtags::Region;

/// Languages with a well-known Wikipedia edition
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("de", "Deutsch"),
    ("fr", "Français"),
    ("es", "Español"),
    ("it", "Italiano"),
    ("pt", "Português"),
    ("nl", "Nederlands"),
    ("pl", "Polski"),
    ("ru", "Русский"),
    ("uk", "Українська"),
    ("ja", "日本語"),
    ("zh", "中文"),
    ("ko", "한국어"),
    ("ar", "العربية"),
];

/// A language a provider can search in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub code: LangCode,
    pub name: String,
}

impl Language {
    pub fn new(code: LangCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

/// A region a provider can restrict results to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub code: RegionCode,
    pub name: String,
}

impl Region {
    pub fn new(code: RegionCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

/// Parse a language tag, e.g. `"de-de"` or `"en"`
pub fn parse_lang_code(s: &str) -> Result<LangCode> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SearchError::Locale(s.to_string()));
    }
    trimmed
        .parse::<LanguageIdentifier>()
        .map_err(|_| SearchError::Locale(s.to_string()))
}

/// Parse a region code, e.g. `"DE"` or `"de"`
pub fn parse_region_code(s: &str) -> Result<RegionCode> {
    s.trim()
        .parse::<RegionCode>()
        .map_err(|_| SearchError::Locale(s.to_string()))
}

/// The primary language subtag in lowercase, e.g. `"de"` for `de-AT`
pub fn base_language(code: &LangCode) -> String {
    code.language.to_string().to_lowercase()
}

/// Languages from [`SUPPORTED_LANGUAGES`] as typed values
pub fn supported_languages() -> Vec<Language> {
    SUPPORTED_LANGUAGES
        .iter()
        .filter_map(|(code, name)| {
            parse_lang_code(code)
                .ok()
                .map(|code| Language::new(code, *name))
        })
        .collect()
}
