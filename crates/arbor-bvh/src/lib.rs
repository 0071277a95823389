pub mod build;
pub mod encode;
pub mod query;

use arbor_core::Aabb;
use serde::Serialize;

/// Maximum number of segments referenced by one leaf.
pub const LEAF_CAPACITY: usize = 8;
/// High bit of a node's `hi` word; set on leaves.
pub const LEAF_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Internal { left: usize, right: usize },
    /// `count` segment indices starting at `start` in the leaf index list.
    Leaf { start: usize, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: NodeKind,
}

/// Binary bounding volume hierarchy over segment capsules; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    pub leaf_indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BvhStats {
    pub nodes: usize,
    pub leaves: usize,
    pub segments: usize,
    pub max_depth: usize,
    pub max_leaf_size: usize,
}

impl Bvh {
    pub fn root(&self) -> Option<&BvhNode> {
        self.nodes.first()
    }

    /// Segment indices stored in a leaf node; empty for internal nodes.
    pub fn leaf_segments(&self, node: &BvhNode) -> &[u32] {
        match node.kind {
            NodeKind::Leaf { start, count } => &self.leaf_indices[start..start + count],
            NodeKind::Internal { .. } => &[],
        }
    }

    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats {
            nodes: self.nodes.len(),
            segments: self.leaf_indices.len(),
            ..BvhStats::default()
        };
        if self.nodes.is_empty() {
            return stats;
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            stats.max_depth = stats.max_depth.max(depth);
            match self.nodes[index].kind {
                NodeKind::Leaf { count, .. } => {
                    stats.leaves += 1;
                    stats.max_leaf_size = stats.max_leaf_size.max(count);
                }
                NodeKind::Internal { left, right } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }
        stats
    }
}

pub use build::build_bvh;
pub use encode::{
    NODE_STRIDE, RenderBuffers, SEGMENT_STRIDE, encode_leaf_indices, encode_nodes,
    encode_segments, skeleton_obj,
};
pub use query::Hit;
