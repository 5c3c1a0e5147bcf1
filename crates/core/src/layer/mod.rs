//! Container image layers and the file tree view scanners consume.
//!
//! A [`Layer`] is an immutable, content-addressed archive. Scanners never read
//! the archive stream directly; they ask the layer for a [`FileTree`], which
//! offers a deterministic walk plus random access to file contents.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

pub mod tarfs;

pub use tarfs::TarFs;

/// Type of an entry yielded by [`FileTree::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    /// Devices, FIFOs, and anything else that carries no file content.
    Other,
}

/// One node of a file tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Slash-separated path relative to the tree root, without a leading `/`.
    pub path: String,
    /// Unix permission bits.
    pub mode: u32,
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Regular file with at least one of the owner, group, or other execute bits set.
    pub fn is_executable(&self) -> bool {
        self.kind == EntryKind::Regular && self.mode & 0o111 != 0
    }
}

/// Hierarchical view over a layer's contents.
///
/// `walk` must be depth-first and deterministic: the same tree walked twice
/// yields the same entries in the same order.
pub trait FileTree {
    /// Walk every entry below the root, parents before children.
    fn walk(&self) -> Box<dyn Iterator<Item = io::Result<TreeEntry>> + '_>;

    /// Read the full contents of the regular file at `path`.
    fn read_file(&self, path: &str) -> io::Result<Cow<'_, [u8]>>;
}

/// An image layer: archive bytes plus their content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    digest: String,
    bytes: Vec<u8>,
}

impl Layer {
    /// Wrap archive bytes, computing a `sha256:` digest over them.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let digest = format!("sha256:{:x}", Sha256::digest(&bytes));
        Self { digest, bytes }
    }

    /// Wrap archive bytes under a digest the caller already knows (e.g., from a manifest).
    pub fn with_digest(digest: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { digest: digest.into(), bytes: bytes.into() }
    }

    /// Load a layer archive (plain or gzip-compressed tar) from disk.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Materialize the archive into a random-access file tree.
    pub fn file_tree(&self) -> io::Result<TarFs<'_>> {
        TarFs::new(&self.bytes)
    }
}
