pub mod reconcile;

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error};

use crate::error::{FsError, Result};
use crate::service::ServiceHandle;

/// Filesystem change as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
    /// The watcher lost events; the whole tree has to be compared with the disk.
    Rescan,
}

/// Start watching `root` recursively. Events are translated on the watcher's
/// thread and handed to the service loop; the graph is never touched here.
/// The returned watcher must be kept alive for events to keep flowing.
pub fn start_watcher(root: &Path, service: ServiceHandle) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for change in translate(&event) {
                if service.notify(change).is_err() {
                    debug!("service loop gone, dropping change event");
                    return;
                }
            }
        }
        Err(e) => {
            error!("Watcher error: {}", e);
        }
    })
    .map_err(|e| FsError::Config(format!("failed to create file watcher: {}", e)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| FsError::Config(format!("failed to watch {}: {}", root.display(), e)))?;
    debug!("File watcher started on {}", root.display());
    Ok(watcher)
}

/// Map a notify event onto change events, one per affected path.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    let each = |make: fn(PathBuf) -> ChangeEvent| -> Vec<ChangeEvent> {
        event.paths.iter().cloned().map(make).collect()
    };

    if event.need_rescan() {
        return vec![ChangeEvent::Rescan];
    }

    match event.kind {
        EventKind::Create(_) => each(ChangeEvent::Created),
        EventKind::Remove(_) => each(ChangeEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![ChangeEvent::Moved {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(ChangeEvent::Created),
        // Backends that cannot tell the two rename halves apart.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.symlink_metadata().is_ok() {
                    ChangeEvent::Created(p.clone())
                } else {
                    ChangeEvent::Deleted(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => each(ChangeEvent::Modified),
        _ => Vec::new(),
    }
}
