//! Tracing subscriber setup.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::config::{LogFormat, LoggingConfig};

/// Default filter directive for `config`, used when `RUST_LOG` is unset.
pub fn default_directive(config: &LoggingConfig) -> String {
    let level = config.level.as_str();
    // Dependencies stay at warn unless explicitly asked for debug output.
    if level == "debug" {
        format!("info,ghcr_exporter={level},tower_http=debug")
    } else {
        format!("warn,ghcr_exporter={level},tower_http={level}")
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
/// Returns `TryInitError` if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_directive() {
        let mut config = LoggingConfig::default();
        assert_eq!(
            default_directive(&config),
            "warn,ghcr_exporter=info,tower_http=info"
        );

        config.level = LogLevel::Debug;
        assert!(default_directive(&config).contains("ghcr_exporter=debug"));

        config.level = LogLevel::Error;
        assert!(EnvFilter::try_new(default_directive(&config)).is_ok());
    }
}
