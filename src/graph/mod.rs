//! In-process node store: a hierarchy of typed nodes with browse names and
//! registered methods. Stands in for the address space of the protocol stack.

pub mod variant;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};

pub use self::variant::Variant;

/// Well-known parent of the projected root folder.
pub const OBJECTS: NodeId = NodeId { ns: 0, id: 85 };

/// First identifier handed out by [`AddressSpace::add_node`].
const FIRST_NODE_ID: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    pub ns: u16,
    pub id: u64,
}

impl NodeId {
    pub const fn new(ns: u16, id: u64) -> Self {
        Self { ns, id }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};i={}", self.ns, self.id)
    }
}

impl FromStr for NodeId {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || FsError::InvalidArgument(format!("malformed node id {:?}", s));
        let (ns, id) = s.split_once(';').ok_or_else(bad)?;
        let ns = ns.strip_prefix("ns=").ok_or_else(bad)?;
        let id = id.strip_prefix("i=").ok_or_else(bad)?;
        Ok(NodeId {
            ns: ns.parse().map_err(|_| bad())?,
            id: id.parse().map_err(|_| bad())?,
        })
    }
}

impl TryFrom<String> for NodeId {
    type Error = FsError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Object,
    Folder,
    File,
}

/// Callables a node can expose to remote callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    CreateDirectory,
    CreateFile,
    Delete,
    MoveOrCopy,
    Open,
    Close,
    Read,
    Write,
    SetPosition,
    GetPosition,
}

pub const FOLDER_METHODS: [Method; 4] = [
    Method::CreateDirectory,
    Method::CreateFile,
    Method::Delete,
    Method::MoveOrCopy,
];

pub const FILE_METHODS: [Method; 6] = [
    Method::Open,
    Method::Close,
    Method::Read,
    Method::Write,
    Method::SetPosition,
    Method::GetPosition,
];

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::CreateDirectory => "CreateDirectory",
            Method::CreateFile => "CreateFile",
            Method::Delete => "Delete",
            Method::MoveOrCopy => "MoveOrCopy",
            Method::Open => "Open",
            Method::Close => "Close",
            Method::Read => "Read",
            Method::Write => "Write",
            Method::SetPosition => "SetPosition",
            Method::GetPosition => "GetPosition",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        FOLDER_METHODS
            .iter()
            .chain(FILE_METHODS.iter())
            .copied()
            .find(|m| m.name() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub id: NodeId,
    pub kind: NodeKind,
    pub browse_name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub methods: Vec<Method>,
}

pub struct AddressSpace {
    namespace: u16,
    nodes: RwLock<HashMap<NodeId, NodeEntry>>,
    next_id: AtomicU64,
}

impl AddressSpace {
    pub fn new(namespace: u16) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            OBJECTS,
            NodeEntry {
                id: OBJECTS,
                kind: NodeKind::Object,
                browse_name: "Objects".to_string(),
                parent: None,
                children: Vec::new(),
                methods: Vec::new(),
            },
        );
        Self {
            namespace,
            nodes: RwLock::new(nodes),
            next_id: AtomicU64::new(FIRST_NODE_ID),
        }
    }

    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Create a node under `parent`. Browse names are unique among siblings.
    pub fn add_node(&self, parent: NodeId, kind: NodeKind, name: &str) -> Result<NodeId> {
        let mut nodes = self.nodes.write();
        let siblings = match nodes.get(&parent) {
            Some(p) => &p.children,
            None => return Err(FsError::NotFound(format!("parent node {}", parent))),
        };
        if siblings
            .iter()
            .any(|c| nodes.get(c).is_some_and(|n| n.browse_name == name))
        {
            return Err(FsError::AlreadyExists(format!("{:?} under {}", name, parent)));
        }

        let id = NodeId::new(self.namespace, self.next_id.fetch_add(1, Ordering::Relaxed));
        nodes.insert(
            id,
            NodeEntry {
                id,
                kind,
                browse_name: name.to_string(),
                parent: Some(parent),
                children: Vec::new(),
                methods: Vec::new(),
            },
        );
        if let Some(p) = nodes.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    pub fn register_method(&self, id: NodeId, method: Method) -> Result<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| FsError::NotFound(format!("node {}", id)))?;
        if !node.methods.contains(&method) {
            node.methods.push(method);
        }
        Ok(())
    }

    pub fn has_method(&self, id: NodeId, method: Method) -> bool {
        self.nodes
            .read()
            .get(&id)
            .is_some_and(|n| n.methods.contains(&method))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<NodeEntry> {
        self.nodes.read().get(&id).cloned()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.read().get(&id).and_then(|n| n.parent)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.read().get(&id).map(|n| n.kind)
    }

    pub fn browse_name(&self, id: NodeId) -> Option<String> {
        self.nodes.read().get(&id).map(|n| n.browse_name.clone())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn child_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        nodes.get(&id)?.children.iter().copied().find(|c| {
            nodes
                .get(c)
                .is_some_and(|n| n.browse_name == name)
        })
    }

    /// Detach `id` from its parent and drop it with all descendants.
    /// Returns every removed id; empty if `id` was unknown.
    pub fn remove_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = self.nodes.write();
        let parent = match nodes.get(&id) {
            Some(n) => n.parent,
            None => return Vec::new(),
        };
        if let Some(p) = parent.and_then(|p| nodes.get_mut(&p)) {
            p.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(entry) = nodes.remove(&next) {
                stack.extend(entry.children);
                removed.push(next);
            }
        }
        removed
    }

    /// Number of nodes, `Objects` included.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
