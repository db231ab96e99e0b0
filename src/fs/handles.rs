use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::{FsError, Result};
use crate::graph::NodeId;

/// Token issued by `Open` and presented on every later call against the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileHandle(pub u32);

/// Open modes as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpenMode {
    Read,
    Write,
    Append,
    ReadUpdate,
    WriteUpdate,
    AppendUpdate,
}

impl OpenMode {
    pub fn code(self) -> u32 {
        match self {
            OpenMode::Read => 1,
            OpenMode::Write => 2,
            OpenMode::Append => 3,
            OpenMode::ReadUpdate => 5,
            OpenMode::WriteUpdate => 6,
            OpenMode::AppendUpdate => 7,
        }
    }

    /// `std` equivalents of `rb`, `wb`, `ab`, `r+b`, `w+b`, `a+b`.
    pub fn options(self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match self {
            OpenMode::Read => opts.read(true),
            OpenMode::Write => opts.write(true).create(true).truncate(true),
            OpenMode::Append => opts.append(true).create(true),
            OpenMode::ReadUpdate => opts.read(true).write(true),
            OpenMode::WriteUpdate => opts.read(true).write(true).create(true).truncate(true),
            OpenMode::AppendUpdate => opts.read(true).append(true).create(true),
        };
        opts
    }
}

impl TryFrom<u32> for OpenMode {
    type Error = FsError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            1 => Ok(OpenMode::Read),
            2 => Ok(OpenMode::Write),
            3 => Ok(OpenMode::Append),
            5 => Ok(OpenMode::ReadUpdate),
            6 => Ok(OpenMode::WriteUpdate),
            7 => Ok(OpenMode::AppendUpdate),
            other => Err(FsError::InvalidMode(other.into())),
        }
    }
}

#[derive(Debug)]
pub struct OpenHandle {
    pub handle: FileHandle,
    /// File node the handle was issued for.
    pub node: NodeId,
    /// Absolute path at open time.
    pub path: PathBuf,
    pub mode: OpenMode,
    pub file: File,
    pub opened_at: DateTime<Utc>,
}

/// Reporting view of an open handle.
#[derive(Debug, Clone, Serialize)]
pub struct OpenHandleInfo {
    pub handle: u32,
    pub node: String,
    pub path: String,
    pub mode: OpenMode,
    pub opened_at: String,
}

pub struct HandleTable {
    handles: DashMap<FileHandle, OpenHandle>,
    next_handle: AtomicU32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_handle: AtomicU32::new(1),
        }
    }

    pub fn alloc(&self, node: NodeId, path: PathBuf, mode: OpenMode, file: File) -> FileHandle {
        let mut raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        if raw == 0 {
            // Zero is never a valid token, skip it after wrap-around.
            raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        }
        let handle = FileHandle(raw);
        self.handles.insert(
            handle,
            OpenHandle {
                handle,
                node,
                path,
                mode,
                file,
                opened_at: Utc::now(),
            },
        );
        handle
    }

    /// Mutable access to `handle`, only if it was issued for `node`.
    pub fn get_mut(
        &self,
        node: NodeId,
        handle: FileHandle,
    ) -> Option<dashmap::mapref::one::RefMut<'_, FileHandle, OpenHandle>> {
        self.handles.get_mut(&handle).filter(|h| h.node == node)
    }

    /// Remove `handle` if it belongs to `node`. Dropping the entry closes the file.
    pub fn remove(&self, node: NodeId, handle: FileHandle) -> Option<OpenHandle> {
        self.handles
            .remove_if(&handle, |_, h| h.node == node)
            .map(|(_, v)| v)
    }

    /// Close every handle opened on any of `nodes`. Returns how many were closed.
    pub fn evict_nodes(&self, nodes: &[NodeId]) -> usize {
        let before = self.handles.len();
        self.handles.retain(|_, h| !nodes.contains(&h.node));
        before - self.handles.len()
    }

    pub fn open_count(&self, node: NodeId) -> usize {
        self.handles.iter().filter(|h| h.node == node).count()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Open handles ordered by token.
    pub fn list_open(&self) -> Vec<OpenHandleInfo> {
        let mut open: Vec<OpenHandleInfo> = self
            .handles
            .iter()
            .map(|h| OpenHandleInfo {
                handle: h.handle.0,
                node: h.node.to_string(),
                path: h.path.display().to_string(),
                mode: h.mode,
                opened_at: h.opened_at.to_rfc3339(),
            })
            .collect();
        open.sort_by_key(|info| info.handle);
        open
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
