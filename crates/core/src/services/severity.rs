//! Severity normalization for vendor advisories.

use crate::model::Severity;

pub const NONE: &str = "none";
pub const LOW: &str = "low";
pub const MODERATE: &str = "moderate";
pub const IMPORTANT: &str = "important";
pub const CRITICAL: &str = "critical";

/// Map an advisory severity label onto [`Severity`], ignoring case.
///
/// `none` maps to `Unknown`, the same as an empty or unrecognized label.
pub fn normalize_severity(severity: &str) -> Severity {
    match severity.to_lowercase().as_str() {
        NONE => Severity::Unknown,
        LOW => Severity::Low,
        MODERATE => Severity::Medium,
        IMPORTANT => Severity::High,
        CRITICAL => Severity::Critical,
        _ => Severity::Unknown,
    }
}
