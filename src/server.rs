//! Web server module.
//!
//! Serves the Prometheus scrape endpoint, a health probe and a small HTML
//! dashboard describing the exported metrics.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::config::AppConfig;
use crate::metrics::{ExporterMetrics, MetricInfo};
use crate::version::VersionInfo;

const SERVICE_NAME: &str = "ghcr-exporter";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<ExporterMetrics>,
    pub version: VersionInfo,
    pub token_configured: bool,
    pub package_count: usize,
    pub default_interval: Duration,
}

impl AppState {
    /// Snapshot the display settings of `config`.
    pub fn new(config: &AppConfig, metrics: Arc<ExporterMetrics>) -> Self {
        Self {
            metrics,
            version: VersionInfo::current(),
            token_configured: !config.github.token.is_empty(),
            package_count: config.packages.len(),
            default_interval: config.metrics.default_interval,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    service: &'static str,
    version: &'static str,
    commit: &'static str,
    build_date: &'static str,
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    version: &'a VersionInfo,
    token_status: &'static str,
    package_count: usize,
    default_interval: String,
    metrics: &'a [MetricInfo],
}

/// Wrapper to render Askama templates as Axum responses.
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(dashboard_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Dashboard homepage handler.
async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Response {
    HtmlTemplate(DashboardTemplate {
        version: &state.version,
        token_status: if state.token_configured {
            "Configured"
        } else {
            "Not configured"
        },
        package_count: state.package_count,
        default_interval: humantime::format_duration(state.default_interval).to_string(),
        metrics: state.metrics.catalogue(),
    })
    .into_response()
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}")).into_response()
        }
    }
}

/// Liveness probe.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp(),
        service: SERVICE_NAME,
        version: state.version.version,
        commit: state.version.commit,
        build_date: state.version.build_date,
    })
}
