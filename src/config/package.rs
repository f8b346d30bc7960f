//! Package group configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A configured package to collect, or every container package of an owner
/// when `repo` is absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageGroup {
    /// User or organization login.
    pub owner: String,
    /// Package name. Absent or empty selects owner-wide discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Overrides `metrics.default_interval` for this group.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
}

impl PackageGroup {
    pub fn new(owner: impl Into<String>, repo: Option<&str>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.map(str::to_string),
            interval: None,
        }
    }

    /// Set the collection interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// The package name, or `None` for owner-wide discovery.
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref().filter(|r| !r.is_empty())
    }

    /// Group name: `<owner>-<repo>`, or `<owner>-all` for owner-wide discovery.
    pub fn name(&self) -> String {
        format!("{}-{}", self.owner, self.repo().unwrap_or("all"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_name() {
        assert_eq!(PackageGroup::new("octo", Some("app")).name(), "octo-app");
        assert_eq!(PackageGroup::new("octo", None).name(), "octo-all");
        assert_eq!(PackageGroup::new("octo", Some("")).name(), "octo-all");
    }

    #[test]
    fn test_empty_repo_is_discovery() {
        assert_eq!(PackageGroup::new("octo", Some("")).repo(), None);
        assert_eq!(PackageGroup::new("octo", Some("app")).repo(), Some("app"));
    }

    #[test]
    fn test_deserialize_with_interval() {
        let group: PackageGroup =
            serde_yaml::from_str("owner: octo-org\ninterval: 5m\n").unwrap();
        assert_eq!(group.owner, "octo-org");
        assert_eq!(group.repo(), None);
        assert_eq!(group.interval, Some(Duration::from_secs(300)));
    }
}
