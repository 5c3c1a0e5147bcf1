use tracing::debug;

use crate::layer::Layer;
use crate::model::Repository;
use crate::services::indexer::{
    CancellationToken, RepositoryScanner, ScanError, ScannerKind, VersionedScanner,
};

use super::discovery::find_executables;
use super::{SCANNER_NAME, SCANNER_VERSION};

/// The Go module ecosystem, as a package source.
pub const GO_REPOSITORY: Repository = Repository::new_static("Go", "https://pkg.go.dev/");

/// Claim the Go repository when a layer holds any executable at all.
///
/// This is coarser than package detection on purpose: an executable whose
/// build info cannot be decoded still counts.
pub fn repositories_for(executables: &[String]) -> Vec<Repository> {
    if executables.is_empty() {
        Vec::new()
    } else {
        vec![GO_REPOSITORY]
    }
}

/// Repository scanner for layers containing executables.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepoScanner;

impl VersionedScanner for RepoScanner {
    fn name(&self) -> &'static str {
        SCANNER_NAME
    }

    fn version(&self) -> &'static str {
        SCANNER_VERSION
    }

    fn kind(&self) -> ScannerKind {
        ScannerKind::Repository
    }
}

impl RepositoryScanner for RepoScanner {
    fn scan(
        &self,
        layer: &Layer,
        cancel: &CancellationToken,
    ) -> Result<Vec<Repository>, ScanError> {
        let _span = tracing::debug_span!(
            "scan",
            component = "golang/RepoScanner.scan",
            version = self.version(),
            layer = %layer.digest()
        )
        .entered();
        debug!("start");
        cancel.check()?;

        let tree = layer
            .file_tree()
            .map_err(|source| ScanError::Layer { digest: layer.digest().to_string(), source })?;
        let exes = find_executables(&tree, cancel)?;
        let repos = repositories_for(&exes);
        debug!(executables = exes.len(), "done");
        Ok(repos)
    }
}
