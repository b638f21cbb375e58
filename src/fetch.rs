//! Downloading external images.
//!
//! The [`Fetcher`] trait is the network seam of the image stage: production
//! code uses [`HttpFetcher`] (a blocking `reqwest` client shared by the
//! download pool), tests substitute [`tests::MockFetcher`] with canned
//! responses so no test touches the network.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url}: {reason}")]
    Failed { url: String, reason: String },
}

/// Fetch the body of a URL.
///
/// Must be `Sync`: one fetcher is shared by every worker of the download
/// pool.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout.
///
/// Non-2xx responses and empty bodies are errors. There are no retries.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("postexport/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let bytes = response.bytes()?;
        if bytes.is_empty() {
            return Err(FetchError::Failed {
                url: url.to_string(),
                reason: "empty response body".to_string(),
            });
        }
        Ok(bytes.to_vec())
    }
}

/// Normalize an `<img src>` value into a downloadable URL.
///
/// Returns `None` for anything that is not `http(s)://` or protocol-relative.
/// Protocol-relative values get `https:`; HTML-escaped ampersands left in
/// raw attribute text are unescaped.
pub fn normalize_image_url(src: &str) -> Option<String> {
    let src = src.trim().replace("&amp;", "&");
    let absolute = if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src
    };
    let parsed = url::Url::parse(&absolute).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(absolute)
}

/// File-system-safe name for a downloaded file, taken from the URL's last
/// path segment. Falls back to `asset` when the URL has no usable name.
///
/// Whitespace and commas become `-` so the name can appear unescaped in a
/// `srcset` list.
pub fn basename_from_url(url: &str) -> String {
    let last = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();
    let decoded = match urlencoding::decode(&last) {
        Ok(d) => d.into_owned(),
        Err(_) => last.clone(),
    };
    let sanitized: String = sanitize_filename::sanitize(&decoded)
        .chars()
        .map(|c| if c.is_whitespace() || c == ',' { '-' } else { c })
        .collect();
    let trimmed = sanitized.trim_matches(|c| c == '.' || c == '-');
    if trimmed.is_empty() {
        "asset".to_string()
    } else {
        trimmed.to_string()
    }
}
