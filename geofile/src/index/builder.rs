//! Packed Hilbert R-tree bulk construction.
//!
//! Records are ordered by the Hilbert distance of their box centers,
//! normalized to the extent of all records, with the record id breaking
//! ties. Consecutive runs of `node_capacity` entries become leaves, and the
//! same packing is applied to each level of child references until a single
//! root remains. Every node except the last one of a level is full.

use std::thread;

use super::node::{ChildRef, LeafEntry, Node, NodeId};
use super::SpatialIndex;
use crate::bounding_box::BoundingBox;
use crate::constants::{HILBERT_ORDER, MIN_NODE_CAPACITY};
use crate::hilbert::hilbert_key;
use crate::types::Record;

/// Minimum records per worker before key computation is spread over threads
const PARALLEL_KEYS_THRESHOLD: usize = 4096;

pub struct IndexBuilder {
    node_capacity: usize,
    workers: usize,
}

impl IndexBuilder {
    pub fn new(node_capacity: usize, workers: usize) -> Self {
        Self {
            node_capacity: node_capacity.max(MIN_NODE_CAPACITY),
            workers: workers.max(1),
        }
    }

    pub fn build(&self, records: &[Record]) -> SpatialIndex {
        if records.is_empty() {
            return SpatialIndex::empty();
        }

        let extent = records.iter().fold(BoundingBox::empty(), |mut acc, r| {
            acc.expand(&r.bbox);
            acc
        });

        let keys = self.hilbert_keys(records, &extent);
        let mut ordered: Vec<(u64, LeafEntry)> = keys
            .into_iter()
            .zip(records)
            .map(|(key, r)| {
                (
                    key,
                    LeafEntry {
                        bbox: r.bbox,
                        id: r.id,
                    },
                )
            })
            .collect();
        ordered.sort_unstable_by_key(|(key, entry)| (*key, entry.id));

        let mut nodes: Vec<Node> = Vec::with_capacity(records.len() / self.node_capacity * 2 + 1);
        let mut level_refs: Vec<ChildRef> = ordered
            .chunks(self.node_capacity)
            .map(|chunk| {
                let leaf = Node::Leaf {
                    entries: chunk.iter().map(|(_, entry)| *entry).collect(),
                };
                push_node(&mut nodes, leaf)
            })
            .collect();

        let mut level = 0;
        while level_refs.len() > 1 {
            level += 1;
            level_refs = level_refs
                .chunks(self.node_capacity)
                .map(|chunk| {
                    let internal = Node::Internal {
                        children: chunk.to_vec(),
                        level,
                    };
                    push_node(&mut nodes, internal)
                })
                .collect();
        }

        let root = level_refs[0].node;
        log::debug!(
            "Packed {} records into {} nodes, height {}",
            records.len(),
            nodes.len(),
            level + 1
        );
        SpatialIndex::from_nodes(nodes, Some(root), records.len() as u64)
    }

    /// Hilbert key per record, in record order
    fn hilbert_keys(&self, records: &[Record], extent: &BoundingBox) -> Vec<u64> {
        let key = |r: &Record| hilbert_key(&r.bbox, extent, HILBERT_ORDER);
        if self.workers <= 1 || records.len() < PARALLEL_KEYS_THRESHOLD * 2 {
            return records.iter().map(key).collect();
        }

        let chunk_size = records
            .len()
            .div_ceil(self.workers)
            .max(PARALLEL_KEYS_THRESHOLD);
        thread::scope(|scope| {
            let handles: Vec<_> = records
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(key).collect::<Vec<_>>()))
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) -> ChildRef {
    let bbox = node.compute_bbox();
    let id = nodes.len() as NodeId;
    nodes.push(node);
    ChildRef { bbox, node: id }
}
