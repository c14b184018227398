use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Source platform a follow list is scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Twitter => "X (Twitter)",
        }
    }

    fn from_host(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        let bare = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("mobile."))
            .unwrap_or(&host);
        match bare {
            "twitter.com" | "x.com" => Some(Platform::Twitter),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which list on the platform the page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Following,
    Followers,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Following => "following",
            PageType::Followers => "followers",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform and list kind recognised from a page location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    pub platform: Platform,
    pub page_type: PageType,
}

/// Recognise a supported list page from its URL.
///
/// Accepts `https://x.com/<handle>/following` style locations; trailing
/// slashes, query strings and fragments are ignored.
pub fn detect_page(location: &str) -> Option<PageContext> {
    let url = Url::parse(location.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let platform = Platform::from_host(url.host_str()?)?;

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    let page_type = match segments.as_slice() {
        [_handle, list] if list.eq_ignore_ascii_case("following") => PageType::Following,
        [_handle, list] if list.eq_ignore_ascii_case("followers") => PageType::Followers,
        _ => return None,
    };

    Some(PageContext {
        platform,
        page_type,
    })
}
