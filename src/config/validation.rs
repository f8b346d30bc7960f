//! Config error type and the string helpers shared by the YAML and
//! environment loaders.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid YAML in config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Parse a human-readable duration such as `30s`, `5m` or `1h30m` for `field`.
///
/// ```
/// use ghcr_exporter::config::parse_duration;
///
/// let interval = parse_duration("metrics.default_interval", "1h30m").unwrap();
/// assert_eq!(interval.as_secs(), 5400);
/// ```
///
/// # Errors
/// Returns `ConfigError::ValidationError` naming `field` when `value` is blank
/// or not a duration.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::ValidationError(format!("{field} is empty")));
    }
    humantime::parse_duration(value)
        .map_err(|e| ConfigError::ValidationError(format!("{field} '{value}': {e}")))
}

/// Replace every `${NAME}` reference in `input` with `lookup(NAME)`.
///
/// Unresolved names fall back to their `:-` default, or to nothing.
pub fn expand_env_vars_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| {
                caps.get(2)
                    .map_or_else(String::new, |fallback| fallback.as_str().to_string())
            })
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_token(name: &str) -> Option<String> {
        (name == "GITHUB_TOKEN").then(|| "ghp_abc".to_string())
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("x", "30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("x", " 1h ").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("x", "1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_duration_names_field() {
        let err = parse_duration("metrics.default_interval", "soon").unwrap_err();
        assert!(err.to_string().contains("metrics.default_interval 'soon'"));

        let err = parse_duration("metrics.default_interval", "  ").unwrap_err();
        assert!(err.to_string().contains("metrics.default_interval is empty"));

        // A bare number has no unit.
        assert!(parse_duration("x", "30").is_err());
    }

    #[test]
    fn test_expand_resolves_references() {
        assert_eq!(
            expand_env_vars_with("token: \"${GITHUB_TOKEN}\"", only_token),
            "token: \"ghp_abc\""
        );
        assert_eq!(
            expand_env_vars_with("${GITHUB_TOKEN:-fallback}", only_token),
            "ghp_abc"
        );
    }

    #[test]
    fn test_expand_unresolved_references() {
        assert_eq!(expand_env_vars_with("x${MISSING}y", only_token), "xy");
        assert_eq!(
            expand_env_vars_with("api: ${API_URL:-https://api.github.com}", only_token),
            "api: https://api.github.com"
        );
        assert_eq!(expand_env_vars_with("no references", only_token), "no references");
    }
}
