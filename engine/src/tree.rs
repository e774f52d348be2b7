//! Filtered in-memory model of a directory tree.
//!
//! The tree is built top-down from a root path. Every descendant is offered to
//! an optional predicate; entries that fail it are pruned together with their
//! whole subtree, which is never read from disk. The root itself is never
//! filtered.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Construction uses an
//! explicit work stack, so arbitrarily deep trees don't grow the call stack.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{EngineError, Result};

/// Index of a node inside its [`FileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One filesystem entry that survived filtering.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Absolute path of this entry
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Whether the entry was a directory when the tree was built
    pub is_dir: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl FileNode {
    fn new(path: PathBuf, is_dir: bool, parent: Option<NodeId>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        FileNode {
            path,
            name,
            is_dir,
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }
}

/// Immutable arena of [`FileNode`]s rooted at index 0.
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<FileNode>,
}

impl FileTree {
    /// Build the tree rooted at `path`.
    ///
    /// A `path` that does not exist yields a lone non-directory root. Children
    /// appear in the order the filesystem lists them.
    ///
    /// # Errors
    /// - `EnumerationFailed` if a directory in the tree cannot be listed
    /// - `InvalidPath` if `path` cannot be made absolute
    /// - `Cancelled` if `cancel` fires before the walk finishes
    pub fn build(
        path: &Path,
        predicate: Option<&dyn Fn(&Path) -> bool>,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let root_path = std::path::absolute(path).map_err(|e| EngineError::InvalidPath {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root_is_dir = root_path.is_dir();

        let mut nodes = vec![FileNode::new(root_path, root_is_dir, None)];
        let mut pending = vec![NodeId(0)];

        while let Some(id) = pending.pop() {
            cancel.check()?;

            if !nodes[id.0].is_dir {
                continue;
            }

            let dir = nodes[id.0].path.clone();
            let entries = fs::read_dir(&dir).map_err(|e| EngineError::EnumerationFailed {
                path: dir.clone(),
                source: e,
            })?;

            let mut accepted = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| EngineError::EnumerationFailed {
                    path: dir.clone(),
                    source: e,
                })?;
                let child_path = entry.path();

                if let Some(accept) = predicate {
                    if !accept(&child_path) {
                        continue;
                    }
                }

                let child_id = NodeId(nodes.len());
                let child_is_dir = child_path.is_dir();
                nodes.push(FileNode::new(child_path, child_is_dir, Some(id)));
                accepted.push(child_id);
            }

            debug!(dir = %dir.display(), children = accepted.len(), "scanned directory");

            // Reverse so the first listed child is visited first.
            pending.extend(accepted.iter().rev().copied());
            nodes[id.0].children = accepted;
        }

        Ok(FileTree { nodes })
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> &FileNode {
        &self.nodes[0]
    }

    /// # Panics
    /// If `id` came from a different tree and is out of range.
    pub fn node(&self, id: NodeId) -> &FileNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &FileNode> + '_ {
        self.nodes[id.0].children.iter().map(move |c| &self.nodes[c.0])
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first pre-order traversal starting at the root.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root_id()],
        }
    }

    /// All directory nodes, root included, parents before children.
    pub fn directories(&self) -> impl Iterator<Item = &FileNode> + '_ {
        self.iter().filter(|n| n.is_dir)
    }

    /// All non-directory nodes.
    pub fn files(&self) -> impl Iterator<Item = &FileNode> + '_ {
        self.iter().filter(|n| !n.is_dir)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.iter().any(|n| n.path == path)
    }
}

/// Iterator returned by [`FileTree::iter`].
pub struct PreOrder<'a> {
    tree: &'a FileTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a FileNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}
