use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use super::ChangeEvent;
use crate::error::{FsError, Result};
use crate::fs::projection::{entry_kind, project, sorted_entries};
use crate::fs::FileSystem;
use crate::graph::{NodeId, NodeKind};

impl FileSystem {
    /// Apply one change event. Returns whether the graph changed.
    ///
    /// Every event is checked against the disk before it is applied, so
    /// duplicate, stale and reordered events (including the echoes of our own
    /// structural mutations) settle into no-ops.
    pub fn reconcile(&self, event: &ChangeEvent) -> Result<bool> {
        let _guard = self.structure_lock.lock();
        debug!("reconcile({:?})", event);
        match event {
            ChangeEvent::Created(path) | ChangeEvent::Deleted(path) => self.sync_entry(path),
            ChangeEvent::Modified(_) => Ok(false),
            ChangeEvent::Moved { from, to } => {
                let removed = self.sync_entry(from)?;
                let added = self.sync_entry(to)?;
                Ok(removed || added)
            }
            ChangeEvent::Rescan => self.resync_folder(&self.root_dir, self.root()),
        }
    }

    /// Compare the whole subtree under folder `node` with the directory at
    /// `path`, syncing every name seen on either side.
    fn resync_folder(&self, path: &Path, node: NodeId) -> Result<bool> {
        let mut names: BTreeSet<String> = self
            .space
            .children(node)
            .into_iter()
            .filter_map(|c| self.space.browse_name(c))
            .collect();
        for entry in sorted_entries(path)? {
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                names.insert(name.to_string());
            }
        }

        let mut changed = false;
        for name in names {
            let child_path = path.join(&name);
            changed |= self.sync_entry(&child_path)?;
            if let Some(child) = self.space.child_by_name(node, &name) {
                if self.space.kind(child) == Some(NodeKind::Folder) {
                    changed |= self.resync_folder(&child_path, child)?;
                }
            }
        }
        Ok(changed)
    }

    /// Make the node for `path` match what is on disk: project it if it
    /// appeared, drop it if it is gone, replace it if its kind changed.
    fn sync_entry(&self, path: &Path) -> Result<bool> {
        let Some(rel) = self.relative_to_root(path) else {
            debug!("ignoring change outside root: {}", path.display());
            return Ok(false);
        };
        let Some(name) = rel.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let parent_rel = rel.parent().unwrap_or_else(|| Path::new(""));
        let parent = match self.lookup(parent_rel) {
            Some(p) if self.space.kind(p) == Some(NodeKind::Folder) => p,
            _ => {
                debug!("no folder node for {}, skipping", parent_rel.display());
                return Ok(false);
            }
        };

        let on_disk = match fs::symlink_metadata(path) {
            Ok(meta) => entry_kind(&meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(FsError::from_io(path, e)),
        };
        let existing = self.space.child_by_name(parent, name);

        match (existing, on_disk) {
            (None, None) => Ok(false),
            (Some(node), None) => {
                self.drop_subtree(node);
                debug!("reconcile: removed {}", rel.display());
                Ok(true)
            }
            (None, Some(_)) => {
                let node = project(&self.space, path, parent)?;
                debug!("reconcile: projected {} as {}", rel.display(), node);
                Ok(true)
            }
            (Some(node), Some(kind)) if self.space.kind(node) == Some(kind) => Ok(false),
            (Some(node), Some(_)) => {
                self.drop_subtree(node);
                let node = project(&self.space, path, parent)?;
                debug!("reconcile: replaced {} with {}", rel.display(), node);
                Ok(true)
            }
        }
    }
}
