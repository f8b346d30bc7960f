//! Application configuration structures.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::package::PackageGroup;
use super::validation::{ConfigError, expand_env_vars_with, parse_duration};

// =============================================================================
// Constants
// =============================================================================

/// Default collection interval (30 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Largest accepted collection interval (24 hours).
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Default metric name prefix.
pub const DEFAULT_NAMESPACE: &str = "ghcr";

/// Default GitHub REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default GitHub web endpoint, used for package pages.
pub const DEFAULT_WEB_URL: &str = "https://github.com";

/// Highest `GHCR_EXPORTER_PACKAGES_<N>_*` index read from the environment (exclusive).
const ENV_PACKAGE_SLOTS: usize = 10;

const ENV_PREFIX: &str = "GHCR_EXPORTER_";

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Minimum severity of emitted log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::ValidationError(format!(
                "invalid logging level: '{s}' (expected debug, info, warn or error)"
            ))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(ConfigError::ValidationError(format!(
                "invalid logging format: '{s}' (expected json or text)"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info). `RUST_LOG` takes precedence when set.
    pub level: LogLevel,

    /// Output format (default: json).
    pub format: LogFormat,
}

// =============================================================================
// Metrics Configuration
// =============================================================================

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Interval for groups without their own (default: 30s).
    #[serde(with = "humantime_serde")]
    pub default_interval: Duration,

    /// Metric name prefix (default: "ghcr").
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_INTERVAL,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

// =============================================================================
// GitHub Configuration
// =============================================================================

/// A credential whose `Debug` and serialized forms never reveal the value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret, or `None` when empty.
    pub fn expose(&self) -> Option<&str> {
        Some(self.0.as_str()).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("SecretString(<empty>)")
        } else {
            f.write_str("SecretString(<redacted>)")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if self.is_empty() { "" } else { "<redacted>" })
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(String::deserialize(deserializer)?))
    }
}

/// GitHub access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token (falls back to `GITHUB_TOKEN`).
    pub token: SecretString,

    /// REST API endpoint (default: https://api.github.com).
    pub api_url: String,

    /// Web endpoint serving package pages (default: https://github.com).
    pub web_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: SecretString::default(),
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server configuration.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// GitHub access configuration.
    pub github: GitHubConfig,

    /// Package groups to collect.
    pub packages: Vec<PackageGroup>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_with(&content, env_lookup)
    }

    /// Parse YAML content, resolving variables through `lookup`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the content cannot be parsed or validated.
    pub fn from_yaml_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars_with(content, &lookup);
        let mut config: Self = serde_yaml::from_str(&expanded)?;
        config.apply_env_defaults(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from process environment variables only.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for malformed or invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from `GHCR_EXPORTER_*` variables resolved
    /// through `lookup`.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for malformed or invalid values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(host) = var("SERVER_HOST") {
            config.server.bind = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            config.server.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("invalid server port: '{port}'"))
            })?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = level.parse()?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.logging.format = format.parse()?;
        }
        if let Some(interval) = var("METRICS_COLLECTION_DEFAULT_INTERVAL") {
            config.metrics.default_interval =
                parse_duration("metrics.default_interval", &interval)?;
        }
        if let Some(token) = var("GITHUB_TOKEN") {
            config.github.token = SecretString::new(token);
        }

        config.apply_env_defaults(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Fill in the token from `GITHUB_TOKEN` and append package groups from
    /// `GHCR_EXPORTER_PACKAGES_<N>_OWNER` / `_REPO`.
    fn apply_env_defaults<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.github.token.is_empty() {
            if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
                self.github.token = SecretString::new(token);
            }
        }

        for slot in 0..ENV_PACKAGE_SLOTS {
            let Some(owner) = lookup(&format!("{ENV_PREFIX}PACKAGES_{slot}_OWNER"))
                .filter(|o| !o.is_empty())
            else {
                continue;
            };
            let repo = lookup(&format!("{ENV_PREFIX}PACKAGES_{slot}_REPO"));
            tracing::debug!(slot, owner = %owner, repo = ?repo, "Loaded package group from environment");
            self.packages.push(PackageGroup::new(owner, repo.as_deref()));
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        validate_interval("metrics default_interval", self.metrics.default_interval)?;
        validate_namespace(&self.metrics.namespace)?;

        if self.github.token.is_empty() {
            return Err(ConfigError::ValidationError(
                "github token is required".to_string(),
            ));
        }
        validate_url("github api_url", &self.github.api_url)?;
        validate_url("github web_url", &self.github.web_url)?;

        // Validate package groups
        let mut seen_names = HashSet::new();
        for group in &self.packages {
            if group.owner.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "package owner cannot be empty".to_string(),
                ));
            }
            let name = group.name();
            if let Some(interval) = group.interval {
                validate_interval(&format!("package '{name}' interval"), interval)?;
            }
            if !seen_names.insert(name.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate package group: '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Collection interval of `group`.
    pub fn interval_for(&self, group: &PackageGroup) -> Duration {
        group.interval.unwrap_or(self.metrics.default_interval)
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn validate_interval(field: &str, interval: Duration) -> Result<(), ConfigError> {
    if interval < Duration::from_secs(1) || interval > MAX_INTERVAL {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be between 1s and 24h, got {}",
            humantime::format_duration(interval)
        )));
    }
    Ok(())
}

fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    let mut chars = namespace.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "invalid metrics namespace: '{namespace}'"
        )))
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value)
        .map_err(|e| ConfigError::ValidationError(format!("{field} '{value}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "{field} must use http or https, got '{value}'"
        )));
    }
    Ok(())
}
