//! JSON shapes returned by the GitHub packages API.
//!
//! Only the fields the exporter reads are modelled; everything else in the
//! payload is ignored.

use serde::{Deserialize, Serialize};

/// A container package as returned by `/{users|orgs}/{owner}/packages/container/{name}`
/// and by the owner package listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub package_type: String,
    #[serde(default)]
    pub version_count: i64,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub owner: Option<PackageOwner>,
    #[serde(default)]
    pub repository: Option<serde_json::Value>,
}

/// Account that owns a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOwner {
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// One published version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Raw RFC 3339 timestamp; missing, null or malformed values are skipped when aggregating.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
