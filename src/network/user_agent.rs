//! Browser-like request headers

use crate::locales::{base_language, LangCode};
use rand::seq::SliceRandom;

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 14_4_1",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

const CHROME_VERSIONS: &[&str] = &["124.0.0.0", "125.0.0.0", "126.0.0.0", "127.0.0.0"];

const FIREFOX_VERSIONS: &[&str] = &["125.0", "126.0", "127.0", "128.0"];

#[derive(Clone, Copy)]
enum Browser {
    Chrome,
    Firefox,
}

/// Pick a realistic desktop user agent; Chrome twice as often as Firefox.
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let browser = [(Browser::Chrome, 2), (Browser::Firefox, 1)]
        .choose_weighted(&mut rng, |(_, w)| *w)
        .map(|(b, _)| *b)
        .unwrap_or(Browser::Chrome);

    match browser {
        Browser::Chrome => {
            let version = CHROME_VERSIONS.choose(&mut rng).copied().unwrap_or("126.0.0.0");
            format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
                platform, version
            )
        }
        Browser::Firefox => {
            let version = FIREFOX_VERSIONS.choose(&mut rng).copied().unwrap_or("127.0");
            format!(
                "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
                platform, version, version
            )
        }
    }
}

/// Accept header for HTML pages
pub fn accept_html() -> &'static str {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
}

/// Accept header for JSON APIs
pub fn accept_json() -> &'static str {
    "application/json,text/javascript,*/*;q=0.01"
}

/// Accept-Language value preferring `lang`, falling back to English
pub fn accept_language(lang: Option<&LangCode>) -> String {
    match lang {
        None => "en-US,en;q=0.9".to_string(),
        Some(code) => {
            let base = base_language(code);
            if base == "en" {
                format!("{},en;q=0.9", code)
            } else {
                format!("{},{};q=0.9,en;q=0.5", code, base)
            }
        }
    }
}
