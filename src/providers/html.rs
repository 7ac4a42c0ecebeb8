//! Small helpers for scraping HTML result pages

use crate::error::{Result, SearchError};
use scraper::{ElementRef, Selector};

/// Compile a CSS selector
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("selector {:?}: {:?}", css, e)))
}

/// Text content of an element with whitespace collapsed
pub(crate) fn text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of query parameter `key` in a possibly relative URL
pub(crate) fn query_value(href: &str, key: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<p>  Hello\n   <b>big</b>   world </p>");
        let p = doc.select(&selector("p").unwrap()).next().unwrap();
        assert_eq!(text(p), "Hello big world");
    }

    #[test]
    fn test_bad_selector() {
        assert!(matches!(selector("div[[["), Err(SearchError::Parse(_))));
    }

    #[test]
    fn test_query_value() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=x";
        assert_eq!(query_value(href, "uddg").as_deref(), Some("https://example.com/a?b=1"));
        assert_eq!(query_value(href, "missing"), None);
        assert_eq!(query_value("/url?q=&sa=U", "q"), None);
        assert_eq!(query_value("/plain", "q"), None);
    }
}
