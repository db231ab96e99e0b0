use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use fsgraph::error::FsError;
use fsgraph::fs::handles::OpenMode;
use fsgraph::fs::projection;
use fsgraph::graph::{Method, NodeKind, OBJECTS};

use crate::helpers::{child_names, node_at, random_tree, TestTree};

/// Test 1: Initial projection of the reference tree.
#[test]
fn test_scenario_projection() {
    let tree = TestTree::scenario();
    let fs = tree.mount();

    let readme = node_at(&fs, "docs/readme.txt");
    assert_eq!(fs.relative_path(readme).unwrap(), PathBuf::from("docs/readme.txt"));
    assert_eq!(
        fs.resolve_path(readme).unwrap(),
        fs.root_dir.join("docs").join("readme.txt")
    );

    let handle = fs.open(readme, OpenMode::Read).unwrap();
    assert_eq!(fs.read(readme, handle, 5).unwrap(), b"hello");

    let empty = node_at(&fs, "empty");
    assert_eq!(fs.space.kind(empty), Some(NodeKind::Folder));
    assert!(fs.space.children(empty).is_empty());
}

/// Test 2: Children are projected in lexicographic order.
#[test]
fn test_entries_sorted() {
    let tree = TestTree::new();
    for name in ["zeta", "alpha", "Mid", "beta.txt"] {
        tree.write(name, "x");
    }
    let fs = tree.mount();
    assert_eq!(
        child_names(&fs, fs.root()),
        vec!["Mid", "alpha", "beta.txt", "zeta"]
    );
}

/// Test 3: Every file of a random tree resolves back to its own relative path.
#[test]
fn test_random_tree_round_trip() {
    for seed in [1u64, 7, 42, 1234] {
        let tree = TestTree::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let files = random_tree(tree.path(), &mut rng, 3);
        let fs = tree.mount();

        for rel in &files {
            let node = fs
                .lookup(rel)
                .unwrap_or_else(|| panic!("seed {}: {} not projected", seed, rel.display()));
            assert_eq!(fs.space.kind(node), Some(NodeKind::File));
            assert_eq!(&fs.relative_path(node).unwrap(), rel);
        }
    }
}

/// Test 4: Folders carry the structural methods, files the I/O methods.
#[test]
fn test_methods_attached_by_kind() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let docs = node_at(&fs, "docs");
    let readme = node_at(&fs, "docs/readme.txt");

    for m in [Method::CreateDirectory, Method::CreateFile, Method::Delete, Method::MoveOrCopy] {
        assert!(fs.space.has_method(docs, m), "folder lacks {:?}", m);
        assert!(!fs.space.has_method(readme, m), "file has {:?}", m);
    }
    for m in [Method::Open, Method::Close, Method::Read, Method::Write, Method::SetPosition] {
        assert!(fs.space.has_method(readme, m), "file lacks {:?}", m);
        assert!(!fs.space.has_method(docs, m), "folder has {:?}", m);
    }
    assert!(fs.space.has_method(fs.root(), Method::CreateFile));
}

/// Test 5: The root folder hangs off Objects and is named after the directory.
#[test]
fn test_root_node() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let expected = fs.root_dir.file_name().unwrap().to_str().unwrap().to_string();

    assert_eq!(fs.space.parent(fs.root()), Some(OBJECTS));
    assert_eq!(fs.space.browse_name(fs.root()), Some(expected));
    assert_eq!(fs.relative_path(fs.root()).unwrap(), PathBuf::new());
    assert_eq!(fs.resolve_path(fs.root()).unwrap(), fs.root_dir);
}

/// Test 6: Symlinks are skipped without failing the scan.
#[cfg(unix)]
#[test]
fn test_symlinks_skipped() {
    let tree = TestTree::scenario();
    std::os::unix::fs::symlink(tree.path().join("docs"), tree.path().join("link")).unwrap();
    let fs = tree.mount();

    assert!(fs.lookup(Path::new("link")).is_none());
    assert_eq!(child_names(&fs, fs.root()), vec!["docs", "empty"]);
}

/// Test 7: Resolution of nodes outside the root reports a broken chain.
#[test]
fn test_broken_chain_and_unknown_node() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let orphan = fs.space.add_node(OBJECTS, NodeKind::File, "orphan").unwrap();

    assert!(matches!(
        fs.relative_path(orphan),
        Err(FsError::BrokenChain { start, .. }) if start == orphan
    ));

    fs.space.remove_subtree(orphan);
    assert!(matches!(fs.relative_path(orphan), Err(FsError::NotFound(_))));
}

/// Test 8: Path translation walks browse names and refuses escaping paths.
#[test]
fn test_translate() {
    let tree = TestTree::scenario();
    let fs = tree.mount();

    assert_eq!(fs.translate("").unwrap(), fs.root());
    assert_eq!(
        fs.translate("docs/readme.txt").unwrap(),
        node_at(&fs, "docs/readme.txt")
    );
    assert!(matches!(fs.translate("docs/missing"), Err(FsError::NotFound(_))));
    assert!(matches!(fs.translate("../etc"), Err(FsError::InvalidName(_))));
}

/// Test 9: Browse reports live sizes and open counts for files.
#[test]
fn test_browse_entries() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let docs = node_at(&fs, "docs");
    let readme = node_at(&fs, "docs/readme.txt");
    let _h = fs.open(readme, OpenMode::Read).unwrap();

    let entries = fs.browse(docs).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "readme.txt");
    assert_eq!(entries[0].size, Some(5));
    assert_eq!(entries[0].open_count, Some(1));

    let top = fs.browse(fs.root()).unwrap();
    let empty = top.iter().find(|e| e.name == "empty").unwrap();
    assert_eq!(empty.kind, NodeKind::Folder);
    assert_eq!(empty.size, None);
}

/// Test 10: A root that is not a directory is rejected up front.
#[test]
fn test_root_must_be_directory() {
    let tree = TestTree::scenario();
    let mut config = tree.config();
    config.root = tree.path().join("docs/readme.txt");
    assert!(matches!(
        fsgraph::fs::FileSystem::new(config),
        Err(FsError::Config(_))
    ));
}

/// Test 11: Projecting an entry that is not a file or directory fails with
/// its path and adds no node.
#[cfg(unix)]
#[test]
fn test_project_unsupported_entry_fails() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let link = fs.root_dir.join("link");
    std::os::unix::fs::symlink("docs", &link).unwrap();
    let before = fs.space.len();

    let err = projection::project(&fs.space, &link, fs.root()).unwrap_err();
    match err {
        FsError::ProjectionFailed { path, cause } => {
            assert_eq!(path, link);
            assert!(matches!(*cause, FsError::InvalidArgument(_)));
        }
        other => panic!("expected ProjectionFailed, got {:?}", other),
    }
    assert_eq!(fs.space.len(), before);

    let missing = fs.root_dir.join("missing");
    assert!(matches!(
        projection::project(&fs.space, &missing, fs.root()),
        Err(FsError::ProjectionFailed { path, .. }) if path == missing
    ));
}
