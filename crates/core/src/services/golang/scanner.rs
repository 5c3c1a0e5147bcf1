use tracing::debug;

use crate::layer::{FileTree, Layer};
use crate::model::Package;
use crate::services::indexer::{
    CancellationToken, PackageScanner, ScanError, ScannerKind, VersionedScanner,
};

use super::buildinfo::{self, BuildInfo, BuildInfoError};
use super::discovery::find_executables;
use super::inventory::packages_for;
use super::{SCANNER_NAME, SCANNER_VERSION};

/// Outcome of looking for build info in one candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Decoded(BuildInfo),
    /// The file is readable but was not produced by the Go toolchain (or its
    /// build info is damaged). The scan moves on.
    NotApplicable(BuildInfoError),
}

/// Read `path` from the tree and try to decode its build info.
///
/// Only a failure to read the file is an error.
pub fn extract(tree: &dyn FileTree, path: &str) -> Result<Extraction, ScanError> {
    let bytes = tree
        .read_file(path)
        .map_err(|source| ScanError::Read { path: path.to_string(), source })?;
    Ok(match buildinfo::read(&bytes) {
        Ok(info) => Extraction::Decoded(info),
        Err(reason) => Extraction::NotApplicable(reason),
    })
}

/// Discover executables in `tree` and inventory every one carrying build info.
pub fn scan_tree(
    tree: &dyn FileTree,
    cancel: &CancellationToken,
) -> Result<Vec<Package>, ScanError> {
    let exes = find_executables(tree, cancel)?;
    let mut out = Vec::new();
    for exe in &exes {
        cancel.check()?;
        match extract(tree, exe)? {
            Extraction::Decoded(info) => {
                debug!(
                    file = %exe,
                    pkg = %info.main.path,
                    go = %info.go_version,
                    "found go executable"
                );
                out.extend(packages_for(exe, &info));
            }
            Extraction::NotApplicable(reason) => {
                debug!(file = %exe, %reason, "skipping executable");
            }
        }
    }
    Ok(out)
}

/// Package scanner for Go executables.
///
/// Looks for executable files and records the modules their embedded build
/// info declares. The zero value is ready to use.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner;

impl VersionedScanner for Scanner {
    fn name(&self) -> &'static str {
        SCANNER_NAME
    }

    fn version(&self) -> &'static str {
        SCANNER_VERSION
    }

    fn kind(&self) -> ScannerKind {
        ScannerKind::Package
    }
}

impl PackageScanner for Scanner {
    /// An empty list is expected when there's nothing found.
    fn scan(&self, layer: &Layer, cancel: &CancellationToken) -> Result<Vec<Package>, ScanError> {
        let _span = tracing::debug_span!(
            "scan",
            component = "golang/Scanner.scan",
            version = self.version(),
            layer = %layer.digest()
        )
        .entered();
        debug!("start");
        cancel.check()?;

        let tree = layer
            .file_tree()
            .map_err(|source| ScanError::Layer { digest: layer.digest().to_string(), source })?;
        let packages = scan_tree(&tree, cancel)?;
        debug!(count = packages.len(), "done");
        Ok(packages)
    }
}
