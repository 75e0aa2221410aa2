//! Where an upload goes: exposition and page ids from the page address.

use regex::Regex;
use url::Url;

const EXPOSITION_PATTERN: &str = r"/view/(\d+)";

/// Page id patterns, tried in order.
const PAGE_PATTERNS: [&str; 3] = [r"/view/\d+/(\d+)", r"/weave/(\d+)", r"[?&]weave=(\d+)"];

/// Extracts remote identifiers from page addresses.
#[derive(Debug, Clone)]
pub struct PageTargetMatcher {
    exposition: Regex,
    pages: Vec<Regex>,
}

impl PageTargetMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            exposition: Regex::new(EXPOSITION_PATTERN)?,
            pages: PAGE_PATTERNS
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Exposition (research) id, from `/view/<id>`.
    pub fn exposition_id(&self, page_url: &str) -> Option<String> {
        capture(&self.exposition, page_url)
    }

    /// Page (weave) id for item placement. The first matching pattern wins.
    pub fn page_id(&self, page_url: &str) -> Option<String> {
        self.pages.iter().find_map(|pattern| capture(pattern, page_url))
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether `page_url` is served by `host` or one of its subdomains.
pub fn is_permitted_host(page_url: &str, host: &str) -> bool {
    let Ok(url) = Url::parse(page_url) else {
        return false;
    };
    match url.host_str() {
        Some(page_host) => {
            let page_host = page_host.to_ascii_lowercase();
            let host = host.to_ascii_lowercase();
            page_host == host || page_host.ends_with(&format!(".{host}"))
        }
        None => false,
    }
}
