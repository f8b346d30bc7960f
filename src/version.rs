//! Build and version information.

use serde::Serialize;

/// Version of this build, reported by `/health`, the dashboard and the
/// `exporter_info` metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
}

impl VersionInfo {
    /// Information baked in at compile time.
    ///
    /// `GHCR_EXPORTER_COMMIT` and `GHCR_EXPORTER_BUILD_DATE` are read from the
    /// build environment and default to `"unknown"`.
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: match option_env!("GHCR_EXPORTER_COMMIT") {
                Some(commit) => commit,
                None => "unknown",
            },
            build_date: match option_env!("GHCR_EXPORTER_BUILD_DATE") {
                Some(date) => date,
                None => "unknown",
            },
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (commit: {}, built: {})",
            self.version, self.commit, self.build_date
        )
    }
}
