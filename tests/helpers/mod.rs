use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;

use fsgraph::config::ServerConfig;
use fsgraph::fs::FileSystem;
use fsgraph::graph::NodeId;

/// A temporary directory tree to project.
pub struct TestTree {
    pub dir: tempfile::TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        TestTree {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// `docs/readme.txt` containing "hello" and an empty `empty/` folder.
    pub fn scenario() -> Self {
        let tree = Self::new();
        tree.write("docs/readme.txt", "hello");
        tree.mkdir("empty");
        tree
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn mkdir(&self, rel: &str) {
        std::fs::create_dir_all(self.path().join(rel)).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel)).unwrap()
    }

    /// Default configuration without a watcher.
    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.path());
        config.watch = false;
        config
    }

    pub fn mount(&self) -> FileSystem {
        FileSystem::new(self.config()).expect("failed to project test tree")
    }

    pub fn mount_with(&self, tweak: impl FnOnce(&mut ServerConfig)) -> FileSystem {
        let mut config = self.config();
        tweak(&mut config);
        FileSystem::new(config).expect("failed to project test tree")
    }
}

/// Node at `rel`, panicking with the path if it is missing.
pub fn node_at(fs: &FileSystem, rel: &str) -> NodeId {
    fs.lookup(Path::new(rel))
        .unwrap_or_else(|| panic!("no node for {:?}", rel))
}

pub fn child_names(fs: &FileSystem, node: NodeId) -> Vec<String> {
    fs.space
        .children(node)
        .into_iter()
        .filter_map(|c| fs.space.browse_name(c))
        .collect()
}

/// Populate `root` with a random tree. Returns the relative paths of every file.
pub fn random_tree(root: &Path, rng: &mut impl Rng, depth: u32) -> Vec<PathBuf> {
    let mut files = Vec::new();
    fill(root, Path::new(""), rng, depth, &mut files);
    files
}

fn fill(root: &Path, rel: &Path, rng: &mut impl Rng, depth: u32, files: &mut Vec<PathBuf>) {
    let entries = rng.gen_range(0..5);
    for i in 0..entries {
        let make_dir = depth > 0 && rng.gen_bool(0.4);
        if make_dir {
            let child = rel.join(format!("dir{}", i));
            std::fs::create_dir(root.join(&child)).unwrap();
            fill(root, &child, rng, depth - 1, files);
        } else {
            let child = rel.join(format!("file{}.bin", i));
            let len = rng.gen_range(0..64);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            std::fs::write(root.join(&child), data).unwrap();
            files.push(child);
        }
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    cond()
}
