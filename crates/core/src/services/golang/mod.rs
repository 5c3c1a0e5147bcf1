//! Go ecosystem: inventories Go executables found in container layers.
//!
//! This module:
//! - Walks a layer's file tree for executable files
//! - Decodes the build info the Go toolchain embeds in each binary
//! - Emits one package per module (plus `stdlib`) scoped to the binary's path
//! - Claims the Go repository for any layer that holds executables

pub mod buildinfo;
pub mod discovery;
pub mod inventory;
pub mod repository;
pub mod scanner;

pub use buildinfo::{BuildInfo, BuildInfoError, BuildSetting, Module};
pub use discovery::find_executables;
pub use inventory::{package_db, packages_for};
pub use repository::{repositories_for, RepoScanner, GO_REPOSITORY};
pub use scanner::{extract, scan_tree, Extraction, Scanner};

use crate::services::indexer::Ecosystem;

pub const ECOSYSTEM_NAME: &str = "golang";
pub const SCANNER_NAME: &str = "golang";
pub const SCANNER_VERSION: &str = "0.0.1";

/// Package name recorded for the toolchain's standard library.
pub const STDLIB: &str = "stdlib";
/// Repository hint attached to every Go package.
pub const REPOSITORY_HINT: &str = "Go";

/// The Go ecosystem: one package scanner, one repository scanner, and no
/// distribution scanners.
pub fn ecosystem() -> Ecosystem {
    let mut ecosystem = Ecosystem::new(ECOSYSTEM_NAME);
    ecosystem.package_scanners.push(Box::new(Scanner));
    ecosystem.repository_scanners.push(Box::new(RepoScanner));
    ecosystem
}
