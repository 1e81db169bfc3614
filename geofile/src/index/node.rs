use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::types::RecordId;

/// Position of a node in the index arena
pub type NodeId = u32;

/// An entry in a leaf node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub bbox: BoundingBox,
    pub id: RecordId,
}

/// A child reference in an internal node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    /// Covering box of every entry below the child
    pub bbox: BoundingBox,
    pub node: NodeId,
}

/// Node types in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        entries: Vec<LeafEntry>,
    },
    Internal {
        children: Vec<ChildRef>,
        level: u32, // height from leaf level (leaves are 0)
    },
}

impl Node {
    /// Bounding box enclosing all children/entries
    pub fn compute_bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        match self {
            Node::Leaf { entries } => {
                for e in entries {
                    bbox.expand(&e.bbox);
                }
            }
            Node::Internal { children, .. } => {
                for c in children {
                    bbox.expand(&c.bbox);
                }
            }
        }
        bbox
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn level(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { level, .. } => *level,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Internal { children, .. } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
