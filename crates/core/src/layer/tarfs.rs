use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Read};
use std::ops::Range;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::EntryType;

use super::{EntryKind, FileTree, TreeEntry};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Hardlink chains longer than this are treated as dangling.
const MAX_LINK_HOPS: usize = 32;

#[derive(Debug, Clone)]
struct Node {
    mode: u32,
    kind: EntryKind,
    content: Option<Range<usize>>,
    link: Option<String>,
    children: BTreeSet<String>,
}

impl Node {
    fn implied_dir() -> Self {
        Self {
            mode: 0o755,
            kind: EntryKind::Directory,
            content: None,
            link: None,
            children: BTreeSet::new(),
        }
    }
}

/// File tree over a materialized tar archive.
///
/// The archive is indexed once up front; file reads afterwards are slices of the
/// (possibly decompressed) archive buffer. Parent directories missing from the
/// archive are synthesized, later entries for a path replace earlier ones, and
/// hardlinks resolve to the content of their target.
#[derive(Debug)]
pub struct TarFs<'a> {
    data: Cow<'a, [u8]>,
    nodes: HashMap<String, Node>,
}

impl<'a> TarFs<'a> {
    /// Index a plain or gzip-compressed tar archive.
    pub fn new(bytes: &'a [u8]) -> io::Result<Self> {
        let data = if bytes.starts_with(&GZIP_MAGIC) {
            let mut out = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut out)?;
            Cow::Owned(out)
        } else {
            Cow::Borrowed(bytes)
        };
        let nodes = index_archive(&data)?;
        Ok(Self { data, nodes })
    }

    /// Number of entries in the tree, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileTree for TarFs<'_> {
    fn walk(&self) -> Box<dyn Iterator<Item = io::Result<TreeEntry>> + '_> {
        let mut stack = Vec::new();
        if let Some(root) = self.nodes.get("") {
            stack.extend(root.children.iter().rev().cloned());
        }
        Box::new(Walk { fs: self, stack })
    }

    fn read_file(&self, path: &str) -> io::Result<Cow<'_, [u8]>> {
        let key = normalize(Path::new(path))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty path"))?;
        let node = self.nodes.get(&key).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {key}"))
        })?;
        let range = match (node.kind, &node.content) {
            (EntryKind::Regular, Some(range)) => range.clone(),
            (kind, _) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a regular file: {key} ({kind:?})"),
                ))
            }
        };
        match self.data.get(range) {
            Some(bytes) => Ok(Cow::Borrowed(bytes)),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive truncated inside {key}"),
            )),
        }
    }
}

struct Walk<'t, 'a> {
    fs: &'t TarFs<'a>,
    stack: Vec<String>,
}

impl Iterator for Walk<'_, '_> {
    type Item = io::Result<TreeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.stack.pop()?;
        let Some(node) = self.fs.nodes.get(&path) else {
            return Some(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("tree index lost entry {path}"),
            )));
        };
        let prefix = format!("{path}/");
        self.stack.extend(node.children.iter().rev().map(|name| format!("{prefix}{name}")));
        Some(Ok(TreeEntry { path, mode: node.mode, kind: node.kind }))
    }
}

/// Collapse an archive path into the tree's key form: slash-separated, no
/// leading slash, `.` dropped and `..` clamped at the root. `None` means the root.
fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn kind_for(entry_type: EntryType) -> EntryKind {
    match entry_type {
        EntryType::Regular | EntryType::Continuous => EntryKind::Regular,
        EntryType::Directory => EntryKind::Directory,
        EntryType::Symlink => EntryKind::Symlink,
        _ => EntryKind::Other,
    }
}

fn index_archive(data: &[u8]) -> io::Result<HashMap<String, Node>> {
    let mut nodes: HashMap<String, Node> = HashMap::new();
    nodes.insert(String::new(), Node::implied_dir());

    let mut archive = tar::Archive::new(data);
    for entry in archive.entries()? {
        let entry = entry?;
        let Some(key) = normalize(&entry.path()?) else {
            continue;
        };
        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header.mode()?;

        let (kind, content, link) = if entry_type.is_hard_link() {
            let target = entry.link_name()?.and_then(|name| normalize(&name));
            (EntryKind::Other, None, target)
        } else {
            let kind = kind_for(entry_type);
            let content = (kind == EntryKind::Regular).then(|| {
                let start = entry.raw_file_position() as usize;
                start..start.saturating_add(entry.size() as usize)
            });
            (kind, content, None)
        };

        insert_parents(&mut nodes, &key);
        let children = match nodes.remove(&key) {
            Some(old) if kind == EntryKind::Directory => old.children,
            Some(old) if !old.children.is_empty() => {
                remove_subtree(&mut nodes, &key);
                BTreeSet::new()
            }
            _ => BTreeSet::new(),
        };
        nodes.insert(key, Node { mode, kind, content, link, children });
    }

    resolve_hardlinks(&mut nodes);
    Ok(nodes)
}

fn insert_parents(nodes: &mut HashMap<String, Node>, key: &str) {
    let mut child = key;
    loop {
        let (parent, name) = match child.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", child),
        };
        let node = nodes.entry(parent.to_string()).or_insert_with(Node::implied_dir);
        let fresh = node.children.insert(name.to_string());
        if parent.is_empty() || !fresh {
            break;
        }
        child = parent;
    }
}

/// Drop every node below `key`; a non-directory entry replaced it.
fn remove_subtree(nodes: &mut HashMap<String, Node>, key: &str) {
    let prefix = format!("{key}/");
    nodes.retain(|path, _| !path.starts_with(&prefix));
}

fn resolve_hardlinks(nodes: &mut HashMap<String, Node>) {
    let links: Vec<String> =
        nodes.iter().filter(|(_, node)| node.link.is_some()).map(|(key, _)| key.clone()).collect();

    for key in links {
        let mut target = nodes.get(&key).and_then(|node| node.link.clone());
        let mut resolved = None;
        for _ in 0..MAX_LINK_HOPS {
            let Some(next) = target.as_ref().and_then(|t| nodes.get(t)) else {
                break;
            };
            if next.link.is_some() {
                target = next.link.clone();
                continue;
            }
            if next.kind == EntryKind::Regular {
                resolved = Some((next.mode, next.content.clone()));
            }
            break;
        }
        if let (Some((mode, content)), Some(node)) = (resolved, nodes.get_mut(&key)) {
            node.mode = mode;
            node.kind = EntryKind::Regular;
            node.content = content;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_root_and_dot_components() {
        assert_eq!(normalize(Path::new("./usr/bin/app")).as_deref(), Some("usr/bin/app"));
        assert_eq!(normalize(Path::new("/usr//bin/")).as_deref(), Some("usr/bin"));
        assert_eq!(normalize(Path::new("usr/../../etc/passwd")).as_deref(), Some("etc/passwd"));
        assert_eq!(normalize(Path::new("./")), None);
    }

    #[test]
    fn insert_parents_synthesizes_missing_directories() {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), Node::implied_dir());
        insert_parents(&mut nodes, "a/b/c");
        assert!(nodes[""].children.contains("a"));
        assert!(nodes["a"].children.contains("b"));
        assert!(nodes["a/b"].children.contains("c"));
        assert_eq!(nodes["a/b"].kind, EntryKind::Directory);
    }
}
