use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ScanConfig};
use crate::layer::Layer;
use crate::model::{Distribution, Package, Repository};

/// Coarse classification of a [`ScanError`] for callers deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Canceled,
    Io,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan canceled")]
    Canceled,
    #[error("Failed to open layer {digest}: {source}")]
    Layer {
        digest: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to walk layer file tree: {0}")]
    Walk(#[source] io::Error),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Canceled => ErrorKind::Canceled,
            ScanError::Layer { .. } | ScanError::Walk(_) | ScanError::Read { .. } => ErrorKind::Io,
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running scan.
///
/// Clones observe the same flag. Scanners check it at the start of a scan and
/// at safe points between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// `Err(ScanError::Canceled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), ScanError> {
        if self.is_canceled() {
            Err(ScanError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerKind {
    Package,
    Distribution,
    Repository,
}

impl ScannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerKind::Package => "package",
            ScannerKind::Distribution => "distribution",
            ScannerKind::Repository => "repository",
        }
    }
}

/// Identity shared by every scanner capability.
pub trait VersionedScanner: Send + Sync {
    fn name(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn kind(&self) -> ScannerKind;
}

/// Finds packages in a layer. An empty result means nothing was found.
pub trait PackageScanner: VersionedScanner {
    fn scan(&self, layer: &Layer, cancel: &CancellationToken) -> Result<Vec<Package>, ScanError>;
}

/// Identifies the operating system release a layer belongs to.
pub trait DistributionScanner: VersionedScanner {
    fn scan(
        &self,
        layer: &Layer,
        cancel: &CancellationToken,
    ) -> Result<Vec<Distribution>, ScanError>;
}

/// Asserts which package repositories a layer's contents came from.
pub trait RepositoryScanner: VersionedScanner {
    fn scan(&self, layer: &Layer, cancel: &CancellationToken)
        -> Result<Vec<Repository>, ScanError>;
}

/// Name, version, and kind of a scanner, as reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub name: String,
    pub version: String,
    pub kind: ScannerKind,
}

impl ScannerInfo {
    pub fn of<S: VersionedScanner + ?Sized>(scanner: &S) -> Self {
        Self {
            name: scanner.name().to_string(),
            version: scanner.version().to_string(),
            kind: scanner.kind(),
        }
    }
}

/// The fixed set of scanners that make up one ecosystem.
pub struct Ecosystem {
    pub name: &'static str,
    pub package_scanners: Vec<Box<dyn PackageScanner>>,
    pub distribution_scanners: Vec<Box<dyn DistributionScanner>>,
    pub repository_scanners: Vec<Box<dyn RepositoryScanner>>,
}

impl Ecosystem {
    /// An ecosystem with no scanners; callers push the capabilities they offer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            package_scanners: Vec::new(),
            distribution_scanners: Vec::new(),
            repository_scanners: Vec::new(),
        }
    }

    pub fn scanners(&self) -> Vec<ScannerInfo> {
        let packages = self.package_scanners.iter().map(|s| ScannerInfo::of(&**s));
        let dists = self.distribution_scanners.iter().map(|s| ScannerInfo::of(&**s));
        let repos = self.repository_scanners.iter().map(|s| ScannerInfo::of(&**s));
        packages.chain(dists).chain(repos).collect()
    }
}

/// Registry of ecosystems; callers select by name.
#[derive(Default)]
pub struct EcosystemRegistry {
    ecosystems: HashMap<String, Ecosystem>,
}

impl EcosystemRegistry {
    pub fn new() -> Self {
        Self { ecosystems: HashMap::new() }
    }

    pub fn register(&mut self, ecosystem: Ecosystem) -> &mut Self {
        self.ecosystems.insert(ecosystem.name.to_string(), ecosystem);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Ecosystem> {
        self.ecosystems.get(name)
    }

    /// Return a sorted list of registered ecosystem names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.ecosystems.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Convenience builder for a registry populated with every compiled-in ecosystem.
pub fn default_ecosystem_registry() -> EcosystemRegistry {
    #[allow(unused_mut)]
    let mut registry = EcosystemRegistry::new();
    #[cfg(feature = "golang")]
    {
        registry.register(crate::services::golang::ecosystem());
    }
    registry
}

/// Everything the selected scanners found in one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerReport {
    pub layer: String,
    pub scanned_at: String,
    pub scanners: Vec<ScannerInfo>,
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<Distribution>,
    pub repositories: Vec<Repository>,
}

/// Runs the scanners of a set of ecosystems over a layer.
pub struct Indexer<'a> {
    ecosystems: Vec<&'a Ecosystem>,
    repository_scan: bool,
}

impl<'a> Indexer<'a> {
    pub fn new(ecosystems: Vec<&'a Ecosystem>) -> Self {
        Self { ecosystems, repository_scan: true }
    }

    /// Select the ecosystems named in `config` from `registry`.
    pub fn from_config(
        registry: &'a EcosystemRegistry,
        config: &ScanConfig,
    ) -> Result<Self, ConfigError> {
        let mut ecosystems = Vec::with_capacity(config.ecosystems.len());
        for name in &config.ecosystems {
            let ecosystem = registry.get(name).ok_or_else(|| ConfigError::UnknownEcosystem {
                name: name.clone(),
                known: registry.names(),
            })?;
            ecosystems.push(ecosystem);
        }
        Ok(Self { ecosystems, repository_scan: config.repository_scan })
    }

    pub fn with_repository_scan(mut self, enabled: bool) -> Self {
        self.repository_scan = enabled;
        self
    }

    pub fn scan_layer(
        &self,
        layer: &Layer,
        cancel: &CancellationToken,
    ) -> Result<LayerReport, ScanError> {
        cancel.check()?;
        let mut report = LayerReport {
            layer: layer.digest().to_string(),
            scanned_at: Utc::now().to_rfc3339(),
            scanners: Vec::new(),
            packages: Vec::new(),
            distributions: Vec::new(),
            repositories: Vec::new(),
        };

        for ecosystem in &self.ecosystems {
            for scanner in &ecosystem.package_scanners {
                report.packages.extend(scanner.scan(layer, cancel)?);
                report.scanners.push(ScannerInfo::of(&**scanner));
            }
            for scanner in &ecosystem.distribution_scanners {
                report.distributions.extend(scanner.scan(layer, cancel)?);
                report.scanners.push(ScannerInfo::of(&**scanner));
            }
            if self.repository_scan {
                for scanner in &ecosystem.repository_scanners {
                    report.repositories.extend(scanner.scan(layer, cancel)?);
                    report.scanners.push(ScannerInfo::of(&**scanner));
                }
            }
        }

        info!(
            layer = %report.layer,
            packages = report.packages.len(),
            distributions = report.distributions.len(),
            repositories = report.repositories.len(),
            "indexed layer"
        );
        Ok(report)
    }
}
