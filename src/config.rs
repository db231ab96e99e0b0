use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{FsError, Result};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:48400";
pub const DEFAULT_NAMESPACE: u16 = 2;
pub const DEFAULT_EVENT_QUEUE: usize = 1024;
pub const DEFAULT_MAX_READ: usize = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "fsgraph", about = "Serve a directory tree as a browsable node graph")]
pub struct Cli {
    /// Directory to expose
    pub root: PathBuf,

    /// Address to accept client connections on
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Namespace index for projected nodes
    #[arg(long, default_value_t = DEFAULT_NAMESPACE)]
    pub namespace: u16,

    /// Log file path
    #[arg(long, default_value = "/tmp/fsgraph.log")]
    pub log_file: PathBuf,

    /// Capacity of the queue between the watcher and the service loop
    #[arg(long, default_value_t = DEFAULT_EVENT_QUEUE)]
    pub event_queue: usize,

    /// Upper bound on bytes returned by a single Read call
    #[arg(long, default_value_t = DEFAULT_MAX_READ)]
    pub max_read_bytes: usize,

    /// Allow only one open handle per file; a second Open evicts the first
    #[arg(long)]
    pub exclusive_open: bool,

    /// Do not watch the root for external changes
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub listen: SocketAddr,
    pub namespace: u16,
    pub log_file: PathBuf,
    pub event_queue: usize,
    pub max_read_bytes: usize,
    pub exclusive_open: bool,
    pub watch: bool,
}

impl ServerConfig {
    /// Configuration with defaults for everything but the root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listen: SocketAddr::from(([0, 0, 0, 0], 48400)),
            namespace: DEFAULT_NAMESPACE,
            log_file: PathBuf::from("/tmp/fsgraph.log"),
            event_queue: DEFAULT_EVENT_QUEUE,
            max_read_bytes: DEFAULT_MAX_READ,
            exclusive_open: false,
            watch: true,
        }
    }

    /// Canonicalize the root and reject settings the server cannot run with.
    pub fn validate(mut self) -> Result<Self> {
        let root = std::fs::canonicalize(&self.root)
            .map_err(|e| FsError::Config(format!("root directory {:?}: {}", self.root, e)))?;
        if !root.is_dir() {
            return Err(FsError::Config(format!(
                "root path is not a directory: {:?}",
                root
            )));
        }
        if self.event_queue == 0 {
            return Err(FsError::Config("event queue capacity must be positive".into()));
        }
        if self.max_read_bytes == 0 {
            return Err(FsError::Config("max read size must be positive".into()));
        }
        self.root = root;
        Ok(self)
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            root: cli.root,
            listen: cli.listen,
            namespace: cli.namespace,
            log_file: cli.log_file,
            event_queue: cli.event_queue,
            max_read_bytes: cli.max_read_bytes,
            exclusive_open: cli.exclusive_open,
            watch: !cli.no_watch,
        }
    }
}
