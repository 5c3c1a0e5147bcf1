//! Inventory model shared by every scanner.
//!
//! Records here are plain values: no identity beyond their fields, freely
//! cloned, and serialized as-is into layer reports.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// How a package was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    /// Package information recovered from metadata embedded in a compiled binary.
    Binary,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Binary => "binary",
        }
    }
}

/// A normalized inventory entry.
///
/// `package_db` scopes the record to the file it was extracted from, so two
/// binaries in one layer that link different versions of the same module do
/// not collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub package_db: String,
    pub kind: PackageKind,
    pub repository_hint: String,
}

/// A package source asserted for a layer.
///
/// Fields are `Cow` so well-known repositories can be declared as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub name: Cow<'static, str>,
    pub uri: Cow<'static, str>,
}

impl Repository {
    pub const fn new_static(name: &'static str, uri: &'static str) -> Self {
        Self { name: Cow::Borrowed(name), uri: Cow::Borrowed(uri) }
    }
}

/// Operating system release detected in a layer.
///
/// Only distribution scanners produce these; the Go ecosystem offers none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Distribution {
    pub did: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_name: Option<String>,
}

/// Normalized vulnerability severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
