pub mod file_ops;
pub mod handles;
pub mod methods;
pub mod projection;
pub mod resolve;
pub mod structure;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use self::handles::{HandleTable, OpenHandleInfo};
use crate::config::ServerConfig;
use crate::error::{FsError, Result};
use crate::graph::{AddressSpace, NodeId, NodeKind, OBJECTS};

/// One child as reported by `browse`.
#[derive(Debug, Clone, Serialize)]
pub struct BrowseEntry {
    pub node: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Current on-disk size, files only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub root: String,
    pub root_node: NodeId,
    pub nodes: usize,
    pub open_handles: Vec<OpenHandleInfo>,
    pub uptime_seconds: u64,
}

/// A directory tree projected into an address space, plus the open-file table.
pub struct FileSystem {
    pub config: ServerConfig,
    /// Canonical root directory.
    pub root_dir: PathBuf,
    /// Node store the tree is projected into.
    pub space: Arc<AddressSpace>,
    /// Files opened through the `Open` method.
    pub handles: HandleTable,
    /// Folder node mirroring `root_dir`.
    root: NodeId,
    /// Serializes structural mutations and change reconciliation.
    pub(crate) structure_lock: Mutex<()>,
    pub start_time: Instant,
}

impl FileSystem {
    /// Validate `config` and project its root directory under `Objects`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let config = config.validate()?;
        let space = Arc::new(AddressSpace::new(config.namespace));
        let root_dir = config.root.clone();

        let root = projection::project(&space, &root_dir, OBJECTS)?;
        info!(
            "projected {} into {} nodes, root={}",
            root_dir.display(),
            space.len() - 1,
            root
        );

        Ok(Self {
            config,
            root_dir,
            space,
            handles: HandleTable::new(),
            root,
            structure_lock: Mutex::new(()),
            start_time: Instant::now(),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn expect_kind(&self, node: NodeId, kind: NodeKind) -> Result<()> {
        match self.space.kind(node) {
            Some(k) if k == kind => Ok(()),
            Some(_) => Err(FsError::InvalidArgument(format!(
                "node {} is not a {:?}",
                node, kind
            ))),
            None => Err(FsError::NotFound(format!("node {}", node))),
        }
    }

    /// Drop `node` and its descendants from the graph and close their handles.
    pub(crate) fn drop_subtree(&self, node: NodeId) -> Vec<NodeId> {
        let removed = self.space.remove_subtree(node);
        let evicted = self.handles.evict_nodes(&removed);
        debug!(
            "removed {} node(s) under {}, closed {} handle(s)",
            removed.len(),
            node,
            evicted
        );
        removed
    }

    /// Children of `node` with live file sizes.
    pub fn browse(&self, node: NodeId) -> Result<Vec<BrowseEntry>> {
        if !self.space.contains(node) {
            return Err(FsError::NotFound(format!("node {}", node)));
        }
        let entries = self
            .space
            .children(node)
            .into_iter()
            .filter_map(|child| self.space.node(child))
            .map(|entry| {
                let (size, open_count) = if entry.kind == NodeKind::File {
                    let size = self
                        .resolve_path(entry.id)
                        .ok()
                        .and_then(|p| std::fs::metadata(p).ok())
                        .map(|m| m.len());
                    (size, Some(self.handles.open_count(entry.id)))
                } else {
                    (None, None)
                };
                BrowseEntry {
                    node: entry.id,
                    name: entry.browse_name,
                    kind: entry.kind,
                    size,
                    open_count,
                }
            })
            .collect();
        Ok(entries)
    }

    pub fn status(&self) -> StatusInfo {
        StatusInfo {
            root: self.root_dir.display().to_string(),
            root_node: self.root,
            nodes: self.space.len(),
            open_handles: self.handles.list_open(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}
