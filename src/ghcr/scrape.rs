//! Download count scraping from the public package page.
//!
//! The hosting API does not expose download statistics, so the count is read
//! from the rendered HTML: the line following the `Total downloads` label
//! carries the exact number in a `title` attribute, e.g.
//! `<h3 title="123456">123K</h3>`.

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::header::{CONTENT_ENCODING, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const DOWNLOADS_MARKER: &str = "Total downloads";
const TITLE_ATTR: &str = "title=\"";

const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    // Only gzip is decoded below.
    ("accept-encoding", "gzip"),
    ("dnt", "1"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("cache-control", "max-age=0"),
];

/// Reasons a download count could not be obtained.
///
/// Callers treat every variant as "no data"; none of them fail a collection.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch package page: {0}")]
    Request(#[from] reqwest::Error),

    #[error("package page returned status {0}")]
    Status(u16),

    #[error("failed to decompress package page: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("response body is empty")]
    EmptyBody,

    #[error("download statistics not found in package page")]
    MarkerNotFound,

    #[error("download count title attribute not found")]
    AttributeNotFound,

    #[error("download count title attribute malformed")]
    AttributeMalformed,

    #[error("failed to parse download count {value:?}: {source}")]
    Parse {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("scrape cancelled")]
    Cancelled,
}

/// Fetches package pages with browser-like headers.
#[derive(Debug, Clone)]
pub struct PageScraper {
    http: Client,
    web_url: String,
    headers: HeaderMap,
}

impl PageScraper {
    /// Create a scraper against `web_url` (e.g. `https://github.com`).
    pub fn new(http: Client, web_url: &str) -> Self {
        let headers = BROWSER_HEADERS
            .iter()
            .map(|&(name, value)| {
                (
                    reqwest::header::HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();

        Self {
            http,
            web_url: web_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    /// URL of the public page of `owner/package`.
    pub fn package_url(&self, owner: &str, package: &str) -> String {
        format!("{}/{owner}/{package}/pkgs/container/{package}", self.web_url)
    }

    /// Fetch the package page and extract its total download count.
    pub async fn scrape_download_count(
        &self,
        owner: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<i64, ScrapeError> {
        let url = self.package_url(owner, package);
        tracing::debug!(owner, package, url = %url, "Fetching package page");

        let request = self.http.get(&url).headers(self.headers.clone());
        let fetch = async {
            let response = request.send().await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(ScrapeError::Status(status.as_u16()));
            }
            let gzipped = response
                .headers()
                .get(CONTENT_ENCODING)
                .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"));
            let body = response.bytes().await?;
            Ok::<_, ScrapeError>((gzipped, body))
        };

        let (gzipped, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            result = fetch => result?,
        };

        let body = if gzipped {
            let mut decoded = Vec::with_capacity(body.len() * 4);
            GzDecoder::new(body.as_ref()).read_to_end(&mut decoded)?;
            decoded
        } else {
            body.to_vec()
        };

        let count = extract_download_count(&String::from_utf8_lossy(&body))?;
        tracing::debug!(owner, package, download_count = count, "Extracted download statistics");
        Ok(count)
    }
}

/// Extract the total download count from a package page body.
///
/// Finds the first line containing `Total downloads` and parses the `title`
/// attribute on the line that follows it.
pub fn extract_download_count(body: &str) -> Result<i64, ScrapeError> {
    if body.is_empty() {
        return Err(ScrapeError::EmptyBody);
    }

    let mut lines = body.lines();
    if !lines.by_ref().any(|line| line.contains(DOWNLOADS_MARKER)) {
        return Err(ScrapeError::MarkerNotFound);
    }

    let line = lines.next().map(str::trim).unwrap_or_default();
    let start = line
        .find(TITLE_ATTR)
        .ok_or(ScrapeError::AttributeNotFound)?
        + TITLE_ATTR.len();
    let len = line[start..]
        .find('"')
        .ok_or(ScrapeError::AttributeMalformed)?;
    let value = &line[start..start + len];

    // Unsigned so a negative title cannot pose as the unavailable sentinel.
    let count = value.parse::<u64>().map_err(|source| ScrapeError::Parse {
        value: value.to_string(),
        source,
    })?;
    i64::try_from(count).map_err(|_| ScrapeError::AttributeMalformed)
}
