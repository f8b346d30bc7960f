//! GitHub packages API client.

use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::types::{PackageInfo, PackageVersion};
use crate::collector::CollectorError;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Authenticated client for the GitHub packages API.
///
/// Paths are written against the user namespace (`/users/{owner}/...`). A 404
/// there is retried once under `/orgs/{owner}/...`, since the same path shape
/// serves organization-owned packages.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client against `api_url` (e.g. `https://api.github.com`).
    pub fn new(http: Client, api_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Whether a bearer token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, path: &str, cancel: &CancellationToken) -> Result<Response, CollectorError> {
        let mut request = self.http.get(self.url(path)).header(ACCEPT, GITHUB_ACCEPT);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CollectorError::Cancelled),
            result = request.send() => Ok(result?),
        }
    }

    /// GET `path`, falling back to the organization namespace on 404.
    ///
    /// # Errors
    /// - `CollectorError::Status` for any non-200 final status
    /// - `CollectorError::Network` on transport failure (no fallback)
    /// - `CollectorError::Cancelled` if `cancel` fires first
    pub async fn request(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, CollectorError> {
        let response = self.send(path, cancel).await?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }

        if status != StatusCode::NOT_FOUND || !path.contains("/users/") {
            return Err(CollectorError::Status {
                status: status.as_u16(),
                url: self.url(path),
            });
        }

        // Release the connection before the second request.
        drop(response);

        let org_path = path.replacen("/users/", "/orgs/", 1);
        tracing::debug!(path, org_path = %org_path, "User endpoint returned 404, trying organization endpoint");

        let response = self.send(&org_path, cancel).await?;
        let status = response.status();
        if status == StatusCode::OK {
            Ok(response)
        } else {
            Err(CollectorError::Status {
                status: status.as_u16(),
                url: self.url(&org_path),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, CollectorError> {
        let response = self.request(path, cancel).await?;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled),
            body = response.bytes() => body?,
        };
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch the package record for `owner/package`.
    pub async fn get_package_info(
        &self,
        owner: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<PackageInfo, CollectorError> {
        self.get_json(&format!("/users/{owner}/packages/container/{package}"), cancel)
            .await
    }

    /// Fetch the published versions of `owner/package`.
    pub async fn get_package_versions(
        &self,
        owner: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, CollectorError> {
        self.get_json(
            &format!("/users/{owner}/packages/container/{package}/versions"),
            cancel,
        )
        .await
    }

    /// List every container package of `owner`, trying the user namespace first.
    pub async fn list_owner_packages(
        &self,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageInfo>, CollectorError> {
        self.get_json(&format!("/users/{owner}/packages?package_type=container"), cancel)
            .await
    }

    /// List every container package of organization `owner`.
    pub async fn list_org_packages(
        &self,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageInfo>, CollectorError> {
        self.get_json(&format!("/orgs/{owner}/packages?package_type=container"), cancel)
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ghcr::build_http_client;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> ApiClient {
        ApiClient::new(
            build_http_client().unwrap(),
            &server.uri(),
            token.map(str::to_string),
        )
    }

    fn package_json(name: &str, versions: i64) -> serde_json::Value {
        serde_json::json!({
            "id": 1,
            "name": name,
            "package_type": "container",
            "version_count": versions,
            "visibility": "public",
            "url": format!("https://api.github.com/users/octo/packages/container/{name}")
        })
    }

    #[tokio::test]
    async fn test_user_endpoint_success_no_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/packages/container/app"))
            .and(header("Accept", GITHUB_ACCEPT))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(package_json("app", 4)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/octo/packages/container/app"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = client(&server, Some("test-token"));
        let info = api
            .get_package_info("octo", "app", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.name, "app");
        assert_eq!(info.version_count, 4);
    }

    #[tokio::test]
    async fn test_not_found_falls_back_to_org() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/acme/packages/container/api"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/packages/container/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(package_json("api", 9)))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let info = api
            .get_package_info("acme", "api", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.version_count, 9);
    }

    #[tokio::test]
    async fn test_org_fallback_failure_reports_org_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost/packages/container/app"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/ghost/packages/container/app"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let err = api
            .get_package_info("ghost", "app", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CollectorError::Status { status, url } => {
                assert_eq!(status, 403);
                assert!(url.ends_with("/orgs/ghost/packages/container/app"));
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_does_not_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/packages/container/app"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/octo/packages/container/app"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let err = api
            .get_package_info("octo", "app", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/packages"))
            .and(query_param("package_type", "container"))
            .respond_with(move |req: &wiremock::Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(401)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!([]))
                }
            })
            .mount(&server)
            .await;

        let api = client(&server, None);
        assert!(!api.has_token());
        let packages = api
            .list_owner_packages("octo", &CancellationToken::new())
            .await
            .unwrap();
        assert!(packages.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/packages/container/app/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let err = api
            .get_package_versions("octo", "app", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(package_json("app", 1))
                    .set_delay(std::time::Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = api
            .get_package_info("octo", "app", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Cancelled));
    }

    #[test]
    fn test_debug_redacts_token() {
        let api = ApiClient::new(
            build_http_client().unwrap(),
            "https://api.github.com/",
            Some("ghp_secret".to_string()),
        );
        let debug = format!("{api:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("https://api.github.com\""));
    }
}
