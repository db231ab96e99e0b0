use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::graph::NodeId;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("No open handle {handle} on node {node}")]
    NotOpen { node: NodeId, handle: u32 },

    #[error("Invalid open mode: {0}")]
    InvalidMode(u64),

    #[error("Broken parent chain resolving {start}: {missing} has no parent")]
    BrokenChain { start: NodeId, missing: NodeId },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Projection of {path} failed: {cause}")]
    ProjectionFailed { path: PathBuf, cause: Box<FsError> },

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Method {method} is not available on node {node}")]
    MethodNotFound { node: NodeId, method: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service loop has stopped")]
    ServiceStopped,
}

impl FsError {
    /// Wrap an OS error, lifting the kinds callers branch on into their own variants.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path.display().to_string()),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path.display().to_string()),
            _ => FsError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Status code reported to remote callers.
    pub fn status_code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "BadNotFound",
            FsError::AlreadyExists(_) => "BadAlreadyExists",
            FsError::NotOpen { .. } => "BadNotOpen",
            FsError::InvalidMode(_) => "BadInvalidMode",
            FsError::BrokenChain { .. } => "BadBrokenChain",
            FsError::Io { .. } => "BadIoError",
            FsError::OpenFailed { .. } => "BadOpenFailed",
            FsError::ProjectionFailed { .. } => "BadProjectionFailed",
            FsError::InvalidName(_) => "BadInvalidName",
            FsError::InvalidArgument(_) => "BadInvalidArgument",
            FsError::MethodNotFound { .. } => "BadMethodInvalid",
            FsError::Config(_) => "BadConfiguration",
            FsError::ServiceStopped => "BadServerHalted",
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
