use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::path;
use crate::types::{NodeData, NodeId};

/// narrow repository capability surface the serializer works against
///
/// one session handle is owned exclusively by one export or import call for
/// its duration. writes stay pending until [`commit`](ContentSession::commit);
/// a session dropped without a commit loses pending changes.
pub trait ContentSession {
    /// read node content at an absolute path
    fn read_node(&self, path: &str) -> Result<Option<NodeData>>;

    /// ordered child names of a node; empty for a leaf or missing node
    fn child_names(&self, path: &str) -> Result<Vec<String>>;

    /// locate a node by stable id anywhere in the tree
    fn path_by_id(&self, id: &NodeId) -> Result<Option<String>>;

    /// create or replace the node at a path; the parent must exist
    fn write_node(&mut self, path: &str, node: NodeData) -> Result<()>;

    /// remove a node and its whole subtree
    fn remove_node(&mut self, path: &str) -> Result<()>;

    /// is the node versioned and currently checked in (read-only)
    fn is_checked_in(&self, path: &str) -> Result<bool>;

    /// check out a versioned node so it can be written
    fn checkout(&mut self, path: &str) -> Result<()>;

    /// make pending changes durable
    fn commit(&mut self) -> Result<()>;
}

#[derive(Clone, Debug)]
struct StoredNode {
    data: NodeData,
    /// child names in insertion order
    children: Vec<String>,
}

#[derive(Clone, Debug)]
struct TreeState {
    nodes: HashMap<String, StoredNode>,
    checked_in: Vec<String>,
}

impl TreeState {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            StoredNode {
                data: NodeData::new("root"),
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            checked_in: Vec::new(),
        }
    }
}

/// in-memory repository with a working/committed split
///
/// reads and writes go against the working state; [`commit`] snapshots it.
/// the committed view makes auto-save checkpointing observable: after a
/// failed import, [`committed_subtree`] shows exactly what the checkpoints
/// preserved.
///
/// [`commit`]: ContentSession::commit
/// [`committed_subtree`]: MemoryRepository::committed_subtree
#[derive(Clone, Debug)]
pub struct MemoryRepository {
    working: TreeState,
    committed: TreeState,
    commit_count: u64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        let state = TreeState::new();
        Self {
            working: state.clone(),
            committed: state,
            commit_count: 0,
        }
    }

    /// number of commits performed on this session
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// mark a node as versioned and checked in
    pub fn mark_checked_in(&mut self, path: &str) {
        if !self.working.checked_in.iter().any(|p| p == path) {
            self.working.checked_in.push(path.to_string());
        }
    }

    /// create a node, creating it under its parent; convenience for tests
    /// and fixtures
    pub fn add_node(&mut self, path: &str, node: NodeData) -> Result<()> {
        self.write_node(path, node)
    }

    /// paths and node data of the working subtree at `root`, in depth-first
    /// order with siblings in stored order
    pub fn subtree(&self, root: &str) -> Vec<(String, NodeData)> {
        Self::collect(&self.working, root)
    }

    /// like [`subtree`](Self::subtree) but over the last committed state
    pub fn committed_subtree(&self, root: &str) -> Vec<(String, NodeData)> {
        Self::collect(&self.committed, root)
    }

    fn collect(state: &TreeState, root: &str) -> Vec<(String, NodeData)> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_string()];
        while let Some(current) = stack.pop() {
            let Some(stored) = state.nodes.get(&current) else {
                continue;
            };
            out.push((current.clone(), stored.data.clone()));
            for child in stored.children.iter().rev() {
                stack.push(path::join(&current, child));
            }
        }
        out
    }

    fn remove_subtree(state: &mut TreeState, root: &str) {
        let doomed: Vec<String> = state
            .nodes
            .keys()
            .filter(|p| path::is_under(p, root))
            .cloned()
            .collect();
        for p in doomed {
            state.nodes.remove(&p);
        }
        state.checked_in.retain(|p| !path::is_under(p, root));
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSession for MemoryRepository {
    fn read_node(&self, path: &str) -> Result<Option<NodeData>> {
        Ok(self.working.nodes.get(path).map(|n| n.data.clone()))
    }

    fn child_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .working
            .nodes
            .get(path)
            .map(|n| n.children.clone())
            .unwrap_or_default())
    }

    fn path_by_id(&self, id: &NodeId) -> Result<Option<String>> {
        Ok(self
            .working
            .nodes
            .iter()
            .find(|(_, n)| n.data.id == *id)
            .map(|(p, _)| p.clone()))
    }

    fn write_node(&mut self, node_path: &str, node: NodeData) -> Result<()> {
        if self.is_checked_in(node_path)? {
            return Err(Error::CheckedIn(node_path.to_string()));
        }

        if node_path == "/" {
            if let Some(root) = self.working.nodes.get_mut("/") {
                root.data = node;
            }
            return Ok(());
        }

        let parent = path::parent(node_path)
            .ok_or_else(|| Error::InvalidPath(node_path.to_string()))?
            .to_string();
        let name = path::name(node_path).to_string();

        {
            let parent_node = self
                .working
                .nodes
                .get_mut(&parent)
                .ok_or_else(|| Error::NodeNotFound(parent.clone()))?;
            if !parent_node.children.iter().any(|c| *c == name) {
                parent_node.children.push(name);
            }
        }

        match self.working.nodes.get_mut(node_path) {
            Some(existing) => existing.data = node,
            None => {
                self.working.nodes.insert(
                    node_path.to_string(),
                    StoredNode {
                        data: node,
                        children: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    fn remove_node(&mut self, node_path: &str) -> Result<()> {
        if node_path == "/" {
            return Err(Error::InvalidPath("cannot remove the root".to_string()));
        }
        if !self.working.nodes.contains_key(node_path) {
            return Err(Error::NodeNotFound(node_path.to_string()));
        }

        if let Some(parent) = path::parent(node_path) {
            let name = path::name(node_path);
            if let Some(parent_node) = self.working.nodes.get_mut(parent) {
                parent_node.children.retain(|c| c != name);
            }
        }
        Self::remove_subtree(&mut self.working, node_path);
        Ok(())
    }

    fn is_checked_in(&self, path: &str) -> Result<bool> {
        Ok(self.working.checked_in.iter().any(|p| p == path))
    }

    fn checkout(&mut self, path: &str) -> Result<()> {
        self.working.checked_in.retain(|p| p != path);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = self.working.clone();
        self.commit_count += 1;
        Ok(())
    }
}
