use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use super::handles::{FileHandle, OpenMode};
use super::FileSystem;
use crate::error::{FsError, Result};
use crate::graph::{NodeId, NodeKind};

impl FileSystem {
    /// Open the file behind `node` and issue a handle for it.
    pub fn open(&self, node: NodeId, mode: OpenMode) -> Result<FileHandle> {
        self.expect_kind(node, NodeKind::File)?;
        let path = self.resolve_path(node)?;
        debug!("open(node={}, mode={:?}, path={})", node, mode, path.display());

        let file = mode
            .options()
            .open(&path)
            .map_err(|source| FsError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        if self.config.exclusive_open {
            let evicted = self.handles.evict_nodes(&[node]);
            if evicted > 0 {
                debug!("open: evicted {} earlier handle(s) on {}", evicted, node);
            }
        }

        Ok(self.handles.alloc(node, path, mode, file))
    }

    /// Close `handle`. Unknown or already closed handles are ignored.
    pub fn close(&self, node: NodeId, handle: FileHandle) {
        debug!("close(node={}, handle={})", node, handle.0);
        if let Some(h) = self.handles.remove(node, handle) {
            debug!("closed {} ({:?})", h.path.display(), h.mode);
        }
    }

    /// Read up to `length` bytes from the current position. Fewer bytes are
    /// returned at end of file, or when `length` exceeds the configured cap.
    pub fn read(&self, node: NodeId, handle: FileHandle, length: i32) -> Result<Vec<u8>> {
        debug!("read(node={}, handle={}, length={})", node, handle.0, length);
        if length < 0 {
            return Err(FsError::InvalidArgument(format!(
                "read length must not be negative, got {}",
                length
            )));
        }
        let length = (length as usize).min(self.config.max_read_bytes);

        let mut entry = self
            .handles
            .get_mut(node, handle)
            .ok_or(FsError::NotOpen {
                node,
                handle: handle.0,
            })?;
        let h = &mut *entry;

        let mut buf = Vec::with_capacity(length);
        Read::by_ref(&mut h.file)
            .take(length as u64)
            .read_to_end(&mut buf)
            .map_err(|e| FsError::from_io(&h.path, e))?;
        Ok(buf)
    }

    /// Write `data` at the current position.
    pub fn write(&self, node: NodeId, handle: FileHandle, data: &[u8]) -> Result<()> {
        debug!("write(node={}, handle={}, size={})", node, handle.0, data.len());
        let mut entry = self
            .handles
            .get_mut(node, handle)
            .ok_or(FsError::NotOpen {
                node,
                handle: handle.0,
            })?;
        let h = &mut *entry;

        h.file
            .write_all(data)
            .and_then(|_| h.file.flush())
            .map_err(|e| FsError::from_io(&h.path, e))
    }

    /// Move to absolute `position`. False if the handle is unknown or the seek fails.
    pub fn set_position(&self, node: NodeId, handle: FileHandle, position: u64) -> bool {
        debug!("set_position(node={}, handle={}, position={})", node, handle.0, position);
        let Some(mut entry) = self.handles.get_mut(node, handle) else {
            return false;
        };
        match entry.file.seek(SeekFrom::Start(position)) {
            Ok(_) => true,
            Err(e) => {
                warn!("seek failed on {}: {}", entry.path.display(), e);
                false
            }
        }
    }

    pub fn get_position(&self, node: NodeId, handle: FileHandle) -> Result<u64> {
        let mut entry = self
            .handles
            .get_mut(node, handle)
            .ok_or(FsError::NotOpen {
                node,
                handle: handle.0,
            })?;
        let h = &mut *entry;
        h.file
            .stream_position()
            .map_err(|e| FsError::from_io(&h.path, e))
    }
}
