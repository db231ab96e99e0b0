use std::path::{Component, Path, PathBuf};

use super::FileSystem;
use crate::error::{FsError, Result};
use crate::graph::NodeId;

impl FileSystem {
    /// Path of `node` relative to the root directory, built from browse names.
    /// The root folder itself resolves to an empty path.
    pub fn relative_path(&self, node: NodeId) -> Result<PathBuf> {
        if !self.space.contains(node) {
            return Err(FsError::NotFound(format!("node {}", node)));
        }

        let mut names = Vec::new();
        let mut current = node;
        while current != self.root {
            // Objects has no parent: a chain that never meets the root ends there.
            let (name, parent) = match (self.space.browse_name(current), self.space.parent(current)) {
                (Some(name), Some(parent)) => (name, parent),
                _ => {
                    return Err(FsError::BrokenChain {
                        start: node,
                        missing: current,
                    })
                }
            };
            names.push(name);
            current = parent;
        }

        Ok(names.iter().rev().collect())
    }

    /// Absolute path of `node`.
    pub fn resolve_path(&self, node: NodeId) -> Result<PathBuf> {
        let rel = self.relative_path(node)?;
        if rel.as_os_str().is_empty() {
            Ok(self.root_dir.clone())
        } else {
            Ok(self.root_dir.join(rel))
        }
    }

    /// Node at `rel` (relative to the root), matching browse names per segment.
    pub fn lookup(&self, rel: &Path) -> Option<NodeId> {
        let mut current = self.root;
        for component in rel.components() {
            match component {
                Component::Normal(name) => {
                    current = self.space.child_by_name(current, name.to_str()?)?;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(current)
    }

    /// Client-facing form of [`lookup`](Self::lookup). An empty path names the root.
    pub fn translate(&self, path: &str) -> Result<NodeId> {
        let rel = if path.is_empty() {
            PathBuf::new()
        } else {
            validate_relative(path)?
        };
        self.lookup(&rel)
            .ok_or_else(|| FsError::NotFound(format!("path {:?}", path)))
    }

    /// `path` relative to the root directory, or `None` when it lies outside.
    pub fn relative_to_root<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root_dir).ok()
    }
}

/// A single path component that names a child of a folder.
pub fn validate_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains(std::path::MAIN_SEPARATOR)
        && !name.contains('\0');
    if valid {
        Ok(name)
    } else {
        Err(FsError::InvalidName(name.to_string()))
    }
}

/// A relative path made only of normal components, so it cannot leave its base.
pub fn validate_relative(path: &str) -> Result<PathBuf> {
    if path.is_empty() || path.contains('\0') {
        return Err(FsError::InvalidName(path.to_string()));
    }
    let mut rel = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            _ => return Err(FsError::InvalidName(path.to_string())),
        }
    }
    if rel.as_os_str().is_empty() {
        return Err(FsError::InvalidName(path.to_string()));
    }
    Ok(rel)
}
