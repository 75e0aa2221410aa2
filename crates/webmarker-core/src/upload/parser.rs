//! Identifier extraction from protocol responses.
//!
//! The service answers with HTML fragments rather than structured data, so
//! identifiers are mined from the body text.

use regex::Regex;

/// Marker the service leaves in a rejected placement form.
pub const VALIDATION_FAILED_MARKER: &str = "formIsValid = 0";

const MEDIA_ID_PATTERN: &str =
    r#"parent\.window\.formAction\s*=\s*['"]/?simple-media/edit\?file=(\d+)['"];"#;

/// Item id patterns, most specific first.
const ITEM_ID_PATTERNS: [&str; 4] = [
    r#"data-id="(\d+)""#,
    r#"item["\s]*:.*?(\d+)"#,
    r#"id["\s]*:.*?(\d+)"#,
    r#""id":\s*"?(\d+)"?"#,
];

/// Reads identifiers out of response bodies.
pub trait ResponseParser: Send + Sync {
    /// Media id from a register response.
    fn media_id(&self, body: &str) -> Option<String>;

    /// Item id from a placement response.
    fn item_id(&self, body: &str) -> Option<String>;

    /// Whether a placement response reports a rejected form.
    fn validation_failed(&self, body: &str) -> bool {
        body.contains(VALIDATION_FAILED_MARKER)
    }
}

/// Default parser backed by regular expressions.
#[derive(Debug, Clone)]
pub struct RegexResponseParser {
    media: Regex,
    items: Vec<Regex>,
}

impl RegexResponseParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            media: Regex::new(MEDIA_ID_PATTERN)?,
            items: ITEM_ID_PATTERNS
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
        })
    }
}

fn first_capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl ResponseParser for RegexResponseParser {
    fn media_id(&self, body: &str) -> Option<String> {
        first_capture(&self.media, body)
    }

    fn item_id(&self, body: &str) -> Option<String> {
        self.items.iter().enumerate().find_map(|(i, pattern)| {
            let id = first_capture(pattern, body)?;
            if i > 0 {
                log::debug!("Item id {} found with fallback pattern {}", id, i);
            }
            Some(id)
        })
    }
}
