//! Configuration module for the exporter.
//!
//! Provides YAML-based (or environment-only) configuration loading and
//! validation for:
//! - Server settings (port, bind address)
//! - Logging (level, output format)
//! - Metrics (default collection interval, metric namespace)
//! - GitHub access (token, API and web endpoints)
//! - Package groups to collect

mod app;
mod package;
mod validation;

pub use app::{
    AppConfig, GitHubConfig, LogFormat, LogLevel, LoggingConfig, MetricsConfig, SecretString,
    ServerConfig,
};
pub use package::PackageGroup;
pub use validation::{ConfigError, expand_env_vars_with, parse_duration};

// Re-export constants
pub use app::{DEFAULT_API_URL, DEFAULT_INTERVAL, DEFAULT_NAMESPACE, DEFAULT_WEB_URL, MAX_INTERVAL};
