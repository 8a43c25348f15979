//! Download URL rewriting for upstream responses.

use regex::bytes::Regex;
use std::borrow::Cow;

const DOWNLOAD_URL_PATTERN: &str = r#"("download_url"\s*:\s*")https?://[^/"]+"#;

/// Points embedded `download_url` values back at this proxy, keeping the
/// path and query of each URL.
#[derive(Debug, Clone)]
pub struct ResponseRewriter {
    pattern: Regex,
    replacement: String,
}

impl ResponseRewriter {
    pub fn new(host: &str, port: u16) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(DOWNLOAD_URL_PATTERN)?,
            replacement: format!("${{1}}http://{}:{}", host, port),
        })
    }

    /// JSON, text, XML and JavaScript bodies are rewritten; a missing
    /// content type is treated as textual.
    pub fn applies_to(content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return true;
        };
        let content_type = content_type.to_ascii_lowercase();
        ["json", "text/", "xml", "javascript"]
            .iter()
            .any(|marker| content_type.contains(marker))
    }

    pub fn rewrite<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern
            .replace_all(body, self.replacement.as_bytes())
    }
}
