use tracing::debug;

use crate::layer::FileTree;
use crate::services::indexer::{CancellationToken, ScanError};

/// Collect the paths of executable regular files, in walk order.
///
/// Any walk error aborts discovery; no partial list is returned.
pub fn find_executables(
    tree: &dyn FileTree,
    cancel: &CancellationToken,
) -> Result<Vec<String>, ScanError> {
    let mut out = Vec::new();
    for entry in tree.walk() {
        cancel.check()?;
        let entry = entry.map_err(ScanError::Walk)?;
        if entry.is_executable() {
            debug!(file = %entry.path, "found executable");
            out.push(entry.path);
        }
    }
    Ok(out)
}
