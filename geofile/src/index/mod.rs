//! Static in-memory spatial index over record bounding boxes.
//!
//! The index is a packed Hilbert R-tree stored as a node arena. It is
//! immutable once built, so concurrent queries read it without locks; the
//! only shared mutable state is the node read counter.

pub mod builder;
pub mod node;
pub mod persistence;

use std::sync::atomic::{AtomicU64, Ordering};

pub use builder::IndexBuilder;
pub use node::{ChildRef, LeafEntry, Node, NodeId};

use crate::bounding_box::BoundingBox;
use crate::types::RecordId;

#[derive(Debug)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    root_bbox: BoundingBox,
    len: u64,
    height: u32,
    node_reads: AtomicU64,
}

impl SpatialIndex {
    pub fn empty() -> Self {
        Self::from_nodes(Vec::new(), None, 0)
    }

    pub(crate) fn from_nodes(nodes: Vec<Node>, root: Option<NodeId>, len: u64) -> Self {
        let root_node = root.and_then(|id| nodes.get(id as usize));
        let root_bbox = root_node
            .map(Node::compute_bbox)
            .unwrap_or_else(BoundingBox::empty);
        let height = root_node.map(|n| n.level() + 1).unwrap_or(0);

        Self {
            nodes,
            root,
            root_bbox,
            len,
            height,
            node_reads: AtomicU64::new(0),
        }
    }

    /// Visits every leaf entry whose box intersects `query`.
    ///
    /// A subtree is only descended when its covering box intersects the
    /// query. Returns the number of nodes read.
    pub fn search<F>(&self, query: &BoundingBox, mut visitor: F) -> u64
    where
        F: FnMut(&LeafEntry),
    {
        let Some(root) = self.root else {
            return 0;
        };

        let mut reads = 0;
        self.search_recursive(root, query, &mut visitor, &mut reads);
        self.node_reads.fetch_add(reads, Ordering::Relaxed);
        reads
    }

    fn search_recursive<F>(
        &self,
        node_id: NodeId,
        query: &BoundingBox,
        visitor: &mut F,
        reads: &mut u64,
    ) where
        F: FnMut(&LeafEntry),
    {
        *reads += 1;
        match &self.nodes[node_id as usize] {
            Node::Leaf { entries } => {
                for entry in entries {
                    if entry.bbox.intersects(query) {
                        visitor(entry);
                    }
                }
            }
            Node::Internal { children, .. } => {
                for child in children {
                    if child.bbox.intersects(query) {
                        self.search_recursive(child.node, query, visitor, reads);
                    }
                }
            }
        }
    }

    /// Ids of all entries intersecting `query`, ascending.
    pub fn search_ids(&self, query: &BoundingBox) -> Vec<RecordId> {
        let mut ids = Vec::new();
        self.search(query, |entry| ids.push(entry.id));
        ids.sort_unstable();
        ids
    }

    /// The `limit` lowest ids intersecting `query`, ascending, and the total
    /// number of intersecting entries.
    pub fn lowest_ids(&self, query: &BoundingBox, limit: usize) -> (Vec<RecordId>, usize) {
        let mut ids = Vec::new();
        self.search(query, |entry| ids.push(entry.id));
        let total = ids.len();
        if limit < total {
            ids.select_nth_unstable(limit);
            ids.truncate(limit);
        }
        ids.sort_unstable();
        (ids, total)
    }

    /// Number of entries intersecting `query`.
    pub fn count(&self, query: &BoundingBox) -> u64 {
        let mut count = 0;
        self.search(query, |_| count += 1);
        count
    }

    /// Covering box of all entries, empty for an empty index
    pub fn root_bbox(&self) -> BoundingBox {
        self.root_bbox
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 0 for an empty index
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn node_count(&self) -> u64 {
        self.nodes.len() as u64
    }

    /// Total nodes read by all searches so far
    pub fn node_reads(&self) -> u64 {
        self.node_reads.load(Ordering::Relaxed)
    }

    /// Checks the structure: every node is reachable exactly once from the
    /// root, levels decrease by one towards the leaves, each child reference
    /// covers its child and the entry count matches.
    pub fn validate(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            if self.nodes.is_empty() && self.len == 0 {
                return Ok(());
            }
            return Err(format!(
                "index without root has {} nodes and {} entries",
                self.nodes.len(),
                self.len
            ));
        };

        let mut seen = vec![false; self.nodes.len()];
        let mut entries = 0u64;
        let root_level = self
            .nodes
            .get(root as usize)
            .map(Node::level)
            .ok_or_else(|| format!("root node {} does not exist", root))?;
        self.validate_node(root, root_level, &mut seen, &mut entries)?;

        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(format!("node {} is not reachable from the root", orphan));
        }
        if entries != self.len {
            return Err(format!(
                "index holds {} entries, expected {}",
                entries, self.len
            ));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        node_id: NodeId,
        expected_level: u32,
        seen: &mut [bool],
        entries: &mut u64,
    ) -> Result<(), String> {
        let index = node_id as usize;
        let node = self
            .nodes
            .get(index)
            .ok_or_else(|| format!("node {} does not exist", node_id))?;
        if std::mem::replace(&mut seen[index], true) {
            return Err(format!("node {} is referenced twice", node_id));
        }
        if node.is_empty() {
            return Err(format!("node {} is empty", node_id));
        }
        if node.level() != expected_level {
            return Err(format!(
                "node {} is at level {}, expected {}",
                node_id,
                node.level(),
                expected_level
            ));
        }

        match node {
            Node::Leaf { entries: leaf } => {
                *entries += leaf.len() as u64;
            }
            Node::Internal { children, level } => {
                let child_level = level
                    .checked_sub(1)
                    .ok_or_else(|| format!("internal node {} is at leaf level", node_id))?;
                for child in children {
                    let child_bbox = self
                        .nodes
                        .get(child.node as usize)
                        .map(Node::compute_bbox)
                        .ok_or_else(|| format!("node {} does not exist", child.node))?;
                    if !child.bbox.contains(&child_bbox) {
                        return Err(format!(
                            "node {} child {} bbox {} does not cover {}",
                            node_id, child.node, child.bbox, child_bbox
                        ));
                    }
                    self.validate_node(child.node, child_level, seen, entries)?;
                }
            }
        }
        Ok(())
    }
}
