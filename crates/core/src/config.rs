use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read scan config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse scan config at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("Unknown ecosystem '{name}'. Known: {}", known.join(", "))]
    UnknownEcosystem { name: String, known: Vec<String> },
}

/// Serializable configuration for a layer scan.
///
/// Loaded from JSON, or YAML when the file extension is `.yaml`/`.yml`.
/// Frontend flags take precedence over values loaded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Schema/config version. This is about the config format, not the scanner version.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Ecosystems whose scanners run, by registry name.
    #[serde(default = "default_ecosystems")]
    pub ecosystems: Vec<String>,
    /// Whether repository scanners run alongside package scanners.
    #[serde(default = "default_true")]
    pub repository_scan: bool,
    /// Default log filter when `RUST_LOG` is not set (e.g., `debug`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

fn default_ecosystems() -> Vec<String> {
    vec!["golang".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            ecosystems: default_ecosystems(),
            repository_scan: true,
            log_level: None,
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&body).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&body).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| ConfigError::Parse { path: path.to_path_buf(), reason })
    }
}
