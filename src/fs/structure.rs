use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::projection::{self, entry_kind, sorted_entries};
use super::resolve::{validate_name, validate_relative};
use super::FileSystem;
use crate::error::{FsError, Result};
use crate::graph::{NodeId, NodeKind};

/// Result code returned next to a created file. The open-on-create request is
/// not honoured, so this is always zero.
pub const CREATE_FILE_RESERVED: u32 = 0;

impl FileSystem {
    /// Create directory `name` inside folder `parent` and project it.
    pub fn create_directory(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        let _guard = self.structure_lock.lock();
        debug!("create_directory(parent={}, name={:?})", parent, name);

        let name = validate_name(name)?;
        self.expect_kind(parent, NodeKind::Folder)?;
        let path = self.resolve_path(parent)?.join(name);

        fs::create_dir(&path).map_err(|e| FsError::from_io(&path, e))?;
        self.reproject(parent, name, &path)
    }

    /// Create empty file `name` inside folder `parent` and project it.
    pub fn create_file(
        &self,
        parent: NodeId,
        name: &str,
        request_open: bool,
    ) -> Result<(NodeId, u32)> {
        let _guard = self.structure_lock.lock();
        debug!(
            "create_file(parent={}, name={:?}, request_open={})",
            parent, name, request_open
        );

        let name = validate_name(name)?;
        self.expect_kind(parent, NodeKind::Folder)?;
        let path = self.resolve_path(parent)?.join(name);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FsError::from_io(&path, e))?;
        let node = self.reproject(parent, name, &path)?;
        Ok((node, CREATE_FILE_RESERVED))
    }

    /// Remove file or empty directory `name` from folder `parent`, together
    /// with its node and any handles open on it.
    pub fn delete(&self, parent: NodeId, name: &str) -> Result<()> {
        let _guard = self.structure_lock.lock();
        debug!("delete(parent={}, name={:?})", parent, name);

        let name = validate_name(name)?;
        self.expect_kind(parent, NodeKind::Folder)?;
        let path = self.resolve_path(parent)?.join(name);

        let meta = fs::symlink_metadata(&path).map_err(|e| FsError::from_io(&path, e))?;
        let removed = if meta.is_dir() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| FsError::from_io(&path, e))?;

        if let Some(node) = self.space.child_by_name(parent, name) {
            self.drop_subtree(node);
        }
        info!("deleted {}", path.display());
        Ok(())
    }

    /// Move (rename) or copy `src` to `dest`, both relative to folder `parent`.
    /// The source must be a regular file or directory, the destination must not
    /// exist and its directory must be projected.
    /// On a move the source nodes are removed; the destination is projected
    /// afresh either way.
    pub fn move_or_copy(
        &self,
        parent: NodeId,
        src: &str,
        dest: &str,
        is_move: bool,
    ) -> Result<NodeId> {
        let _guard = self.structure_lock.lock();
        debug!(
            "move_or_copy(parent={}, src={:?}, dest={:?}, is_move={})",
            parent, src, dest, is_move
        );

        let src_rel = validate_relative(src)?;
        let dest_rel = validate_relative(dest)?;
        self.expect_kind(parent, NodeKind::Folder)?;
        if dest_rel.starts_with(&src_rel) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move or copy {:?} into itself",
                src
            )));
        }

        let base_rel = self.relative_path(parent)?;
        let base = self.resolve_path(parent)?;
        let src_path = base.join(&src_rel);
        let dest_path = base.join(&dest_rel);

        let src_meta =
            fs::symlink_metadata(&src_path).map_err(|e| FsError::from_io(&src_path, e))?;
        if entry_kind(&src_meta).is_none() {
            return Err(FsError::InvalidArgument(format!(
                "{} is not a regular file or directory",
                src_path.display()
            )));
        }
        if fs::symlink_metadata(&dest_path).is_ok() {
            return Err(FsError::AlreadyExists(dest_path.display().to_string()));
        }

        let dest_name = dest_rel
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FsError::InvalidName(dest.to_string()))?;
        let dest_dir_rel = base_rel.join(dest_rel.parent().unwrap_or_else(|| Path::new("")));
        let dest_parent = self.lookup(&dest_dir_rel).ok_or_else(|| {
            FsError::NotFound(format!("destination directory {}", dest_dir_rel.display()))
        })?;

        if is_move {
            fs::rename(&src_path, &dest_path).map_err(|e| FsError::from_io(&src_path, e))?;
            if let Some(old) = self.lookup(&base_rel.join(&src_rel)) {
                self.drop_subtree(old);
            }
        } else {
            copy_tree(&src_path, &dest_path)?;
        }

        let node = self.reproject(dest_parent, dest_name, &dest_path)?;
        info!(
            "{} {} -> {}",
            if is_move { "moved" } else { "copied" },
            src_path.display(),
            dest_path.display()
        );
        Ok(node)
    }

    /// Project `path` as child `name` of `parent`, replacing a stale node of
    /// the same name if one is left over.
    fn reproject(&self, parent: NodeId, name: &str, path: &Path) -> Result<NodeId> {
        if let Some(stale) = self.space.child_by_name(parent, name) {
            warn!("replacing stale node {} for {}", stale, path.display());
            self.drop_subtree(stale);
        }
        projection::project(&self.space, path, parent)
    }
}

/// Copy a file, or a directory with everything under it. Symlinks are
/// recreated pointing at the same target. Stops at the first error, including
/// an entry that cannot be copied; whatever was copied before it stays on disk.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| FsError::from_io(src, e))?;
    let ft = meta.file_type();

    if ft.is_dir() {
        fs::create_dir(dest).map_err(|e| FsError::from_io(dest, e))?;
        for entry in sorted_entries(src)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            copy_tree(&entry, &dest.join(name))?;
        }
    } else if ft.is_file() {
        fs::copy(src, dest).map_err(|e| FsError::from_io(src, e))?;
    } else if ft.is_symlink() {
        copy_symlink(src, dest)?;
    } else {
        return Err(FsError::Io {
            path: src.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot copy special file",
            ),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| FsError::from_io(src, e))?;
    std::os::unix::fs::symlink(&target, dest).map_err(|e| FsError::from_io(dest, e))?;
    debug!("copied symlink {} -> {}", dest.display(), target.display());
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dest: &Path) -> Result<()> {
    Err(FsError::Io {
        path: src.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Unsupported, "cannot copy symlink"),
    })
}
