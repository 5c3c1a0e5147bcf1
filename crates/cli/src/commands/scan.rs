use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use layerscan_core::config::ScanConfig;
use layerscan_core::layer::Layer;
use layerscan_core::services::indexer::{
    default_ecosystem_registry, CancellationToken, Indexer, LayerReport,
};

use crate::display_version;

/// Build the effective scan config: the file named by `config` (if any), then
/// command-line overrides on top.
pub fn load_scan_config(
    config: Option<&Path>,
    ecosystems: &[String],
    no_repository_scan: bool,
) -> Result<ScanConfig> {
    let mut cfg = match config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if !ecosystems.is_empty() {
        cfg.ecosystems = ecosystems.to_vec();
    }
    if no_repository_scan {
        cfg.repository_scan = false;
    }
    Ok(cfg)
}

/// Scan one layer archive and produce its report.
pub fn scan_layer_file(layer_path: &Path, config: &ScanConfig) -> Result<LayerReport> {
    debug!(
        layer = %layer_path.display(),
        ecosystems = ?config.ecosystems,
        repository_scan = config.repository_scan,
        "scanning layer"
    );
    let registry = default_ecosystem_registry();
    let indexer = Indexer::from_config(&registry, config)?;
    let layer = Layer::open(layer_path)
        .with_context(|| format!("Failed to read layer archive: {}", layer_path.display()))?;
    let report = indexer
        .scan_layer(&layer, &CancellationToken::new())
        .with_context(|| format!("Failed to scan layer: {}", layer_path.display()))?;
    Ok(report)
}

/// Scan a layer and print packages and repositories (or the JSON report).
pub fn scan_command(layer_path: &Path, config: &ScanConfig, json: bool) -> Result<()> {
    let report = scan_layer_file(layer_path, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Layer: {}", report.layer);
    if report.packages.is_empty() {
        println!("Packages: (none)");
    } else {
        println!("Packages ({}):", report.packages.len());
        for pkg in &report.packages {
            println!(
                "  - {} {} [{}]",
                pkg.name,
                display_version(&pkg.version),
                pkg.package_db
            );
        }
    }
    if !report.distributions.is_empty() {
        println!("Distributions ({}):", report.distributions.len());
        for dist in &report.distributions {
            println!("  - {} {} ({})", dist.name, dist.version, dist.did);
        }
    }
    if report.repositories.is_empty() {
        println!("Repositories: (none)");
    } else {
        println!("Repositories ({}):", report.repositories.len());
        for repo in &report.repositories {
            println!("  - {} ({})", repo.name, repo.uri);
        }
    }

    Ok(())
}
