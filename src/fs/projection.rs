use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FsError, Result};
use crate::graph::{AddressSpace, Method, NodeId, NodeKind, FILE_METHODS, FOLDER_METHODS};

/// Project `path` under `parent`: a directory becomes a folder node with its
/// entries projected recursively, a regular file becomes a file node.
///
/// Entries are visited in lexicographic order. Nested entries that are neither
/// directories nor regular files, or whose names are not UTF-8, are skipped.
/// The first failure aborts the walk; nodes created before it are kept.
pub fn project(space: &AddressSpace, path: &Path, parent: NodeId) -> Result<NodeId> {
    match project_entry(space, path, parent)? {
        Some(node) => Ok(node),
        None => Err(FsError::ProjectionFailed {
            path: path.to_path_buf(),
            cause: Box::new(FsError::InvalidArgument(
                "not a regular file or directory".to_string(),
            )),
        }),
    }
}

fn project_entry(space: &AddressSpace, path: &Path, parent: NodeId) -> Result<Option<NodeId>> {
    let meta = fs::symlink_metadata(path).map_err(|e| failed(path, FsError::from_io(path, e)))?;

    let kind = match entry_kind(&meta) {
        Some(kind) => kind,
        None => {
            warn!("skipping {}: not a regular file or directory", path.display());
            return Ok(None);
        }
    };
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => {
            warn!("skipping {}: name is not valid UTF-8", path.display());
            return Ok(None);
        }
    };

    let node = space
        .add_node(parent, kind, name)
        .map_err(|e| failed(path, e))?;

    match kind {
        NodeKind::Folder => {
            attach(space, node, &FOLDER_METHODS).map_err(|e| failed(path, e))?;
            for entry in sorted_entries(path).map_err(|e| failed(path, e))? {
                project_entry(space, &entry, node)?;
            }
        }
        _ => attach(space, node, &FILE_METHODS).map_err(|e| failed(path, e))?,
    }

    debug!("projected {} as {:?} {}", path.display(), kind, node);
    Ok(Some(node))
}

fn attach(space: &AddressSpace, node: NodeId, methods: &[Method]) -> Result<()> {
    for method in methods {
        space.register_method(node, *method)?;
    }
    Ok(())
}

/// Keep the innermost failing path when errors bubble out of the recursion.
fn failed(path: &Path, cause: FsError) -> FsError {
    match cause {
        e @ FsError::ProjectionFailed { .. } => e,
        other => FsError::ProjectionFailed {
            path: path.to_path_buf(),
            cause: Box::new(other),
        },
    }
}

/// Node kind for an entry, `None` for symlinks, devices, sockets and pipes.
pub fn entry_kind(meta: &Metadata) -> Option<NodeKind> {
    let ft = meta.file_type();
    if ft.is_dir() {
        Some(NodeKind::Folder)
    } else if ft.is_file() {
        Some(NodeKind::File)
    } else {
        None
    }
}

/// Directory entries of `dir` sorted by file name.
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| FsError::from_io(dir, e))? {
        let entry = entry.map_err(|e| FsError::from_io(dir, e))?;
        entries.push(entry.path());
    }
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}
