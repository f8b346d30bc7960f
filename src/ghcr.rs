//! GitHub Container Registry access.
//!
//! - [`ApiClient`]: authenticated JSON API with the user → organization namespace fallback
//! - [`PageScraper`]: best-effort download count from the public package page

mod api;
mod scrape;
mod types;

use std::time::Duration;

use reqwest::Client;

pub use api::ApiClient;
pub use scrape::{PageScraper, ScrapeError, extract_download_count};
pub use types::{PackageInfo, PackageOwner, PackageVersion};

/// Client-wide request timeout shared by API calls and page scrapes.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by every collection loop.
///
/// # Errors
/// Returns the underlying `reqwest::Error` if the TLS backend cannot be initialised.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("ghcr-exporter/", env!("CARGO_PKG_VERSION")))
        .build()
}
