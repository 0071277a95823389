//! Flat little-endian buffers consumed by the raymarch renderer, plus a
//! line-skeleton OBJ export.
//!
//! Segment record (36 bytes): start xyz f32, radius f32, end xyz f32,
//! depth f32, parent u32 (`u32::MAX` for roots).
//!
//! Node record (32 bytes): min xyz f32, max xyz f32, `lo` u32, `hi` u32.
//! Internal nodes store their children in `lo`/`hi`; leaves store the first
//! leaf index in `lo` and `count | LEAF_FLAG` in `hi`.

use arbor_core::Segment;

use crate::{Bvh, LEAF_FLAG, NodeKind};

pub const SEGMENT_STRIDE: usize = 36;
pub const NODE_STRIDE: usize = 32;
pub const NO_PARENT: u32 = u32::MAX;

pub fn encode_segments(segments: &[Segment]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(segments.len() * SEGMENT_STRIDE);
    for segment in segments {
        push_f32_triplet(&mut bytes, segment.start);
        push_f32(&mut bytes, segment.radius);
        push_f32_triplet(&mut bytes, segment.end);
        push_f32(&mut bytes, segment.depth as f64);
        let parent = segment.parent.map_or(NO_PARENT, |p| p as u32);
        bytes.extend_from_slice(&parent.to_le_bytes());
    }
    bytes
}

pub fn encode_nodes(bvh: &Bvh) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bvh.nodes.len() * NODE_STRIDE);
    for node in &bvh.nodes {
        push_f32_triplet(&mut bytes, node.bounds.min);
        push_f32_triplet(&mut bytes, node.bounds.max);
        let (lo, hi) = match node.kind {
            NodeKind::Internal { left, right } => (left as u32, right as u32),
            NodeKind::Leaf { start, count } => (start as u32, count as u32 | LEAF_FLAG),
        };
        bytes.extend_from_slice(&lo.to_le_bytes());
        bytes.extend_from_slice(&hi.to_le_bytes());
    }
    bytes
}

pub fn encode_leaf_indices(bvh: &Bvh) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bvh.leaf_indices.len() * 4);
    for index in &bvh.leaf_indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

/// The three renderer buffers for one generated structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBuffers {
    pub segments: Vec<u8>,
    pub nodes: Vec<u8>,
    pub leaf_indices: Vec<u8>,
}

impl RenderBuffers {
    pub fn encode(segments: &[Segment], bvh: &Bvh) -> Self {
        Self {
            segments: encode_segments(segments),
            nodes: encode_nodes(bvh),
            leaf_indices: encode_leaf_indices(bvh),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len() / SEGMENT_STRIDE
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() / NODE_STRIDE
    }

    pub fn leaf_index_count(&self) -> usize {
        self.leaf_indices.len() / 4
    }

    /// Single blob: three u32 record counts followed by the three buffers.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            12 + self.segments.len() + self.nodes.len() + self.leaf_indices.len(),
        );
        for count in [
            self.segment_count(),
            self.node_count(),
            self.leaf_index_count(),
        ] {
            bytes.extend_from_slice(&(count as u32).to_le_bytes());
        }
        bytes.extend_from_slice(&self.segments);
        bytes.extend_from_slice(&self.nodes);
        bytes.extend_from_slice(&self.leaf_indices);
        bytes
    }
}

/// Wavefront OBJ with two vertices and one `l` element per segment.
pub fn skeleton_obj(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let [sx, sy, sz] = segment.start;
        let [ex, ey, ez] = segment.end;
        out.push_str(&format!("v {sx} {sy} {sz}\n"));
        out.push_str(&format!("v {ex} {ey} {ez}\n"));
    }
    for index in 0..segments.len() {
        out.push_str(&format!("l {} {}\n", 2 * index + 1, 2 * index + 2));
    }
    out
}

#[inline]
fn push_f32(bytes: &mut Vec<u8>, value: f64) {
    bytes.extend_from_slice(&(value as f32).to_le_bytes());
}

#[inline]
fn push_f32_triplet(bytes: &mut Vec<u8>, value: [f64; 3]) {
    push_f32(bytes, value[0]);
    push_f32(bytes, value[1]);
    push_f32(bytes, value[2]);
}

#[cfg(test)]
mod tests {
    use arbor_core::Segment;

    use super::{NO_PARENT, NODE_STRIDE, RenderBuffers, SEGMENT_STRIDE, skeleton_obj};
    use crate::{LEAF_FLAG, build_bvh};

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn two_segments() -> Vec<Segment> {
        vec![
            Segment::root([0.0, 1.0, 0.0], [0.0, 0.0, 0.0], 0.25),
            Segment {
                start: [0.0, 0.0, 0.0],
                end: [1.0, -1.0, 0.5],
                radius: 0.125,
                depth: 1,
                parent: Some(0),
            },
        ]
    }

    #[test]
    fn segment_records_follow_field_order() {
        let segments = two_segments();
        let buffers = RenderBuffers::encode(&segments, &build_bvh(&segments));
        let bytes = &buffers.segments;
        assert_eq!(bytes.len(), 2 * SEGMENT_STRIDE);

        assert_eq!(f32_at(bytes, 4), 1.0);
        assert_eq!(f32_at(bytes, 12), 0.25);
        assert_eq!(f32_at(bytes, 28), 0.0);
        assert_eq!(u32_at(bytes, 32), NO_PARENT);

        let second = SEGMENT_STRIDE;
        assert_eq!(f32_at(bytes, second + 12), 0.125);
        assert_eq!(f32_at(bytes, second + 16), 1.0);
        assert_eq!(f32_at(bytes, second + 20), -1.0);
        assert_eq!(f32_at(bytes, second + 24), 0.5);
        assert_eq!(f32_at(bytes, second + 28), 1.0);
        assert_eq!(u32_at(bytes, second + 32), 0);
    }

    #[test]
    fn leaf_node_sets_high_bit() {
        let segments = two_segments();
        let buffers = RenderBuffers::encode(&segments, &build_bvh(&segments));
        assert_eq!(buffers.nodes.len(), NODE_STRIDE);
        assert_eq!(f32_at(&buffers.nodes, 0), -0.25);
        assert_eq!(f32_at(&buffers.nodes, 12), 1.125);
        assert_eq!(u32_at(&buffers.nodes, 24), 0);
        assert_eq!(u32_at(&buffers.nodes, 28), 2 | LEAF_FLAG);
        assert_eq!(buffers.leaf_index_count(), 2);
    }

    #[test]
    fn internal_nodes_keep_high_bit_clear() {
        let segments: Vec<Segment> = (0..20)
            .map(|i| Segment::root([i as f64, 0.0, 0.0], [i as f64, 1.0, 0.0], 0.1))
            .collect();
        let buffers = RenderBuffers::encode(&segments, &build_bvh(&segments));
        let root_hi = u32_at(&buffers.nodes, 28);
        assert_eq!(root_hi & LEAF_FLAG, 0);
        assert_eq!(u32_at(&buffers.nodes, 24), 1);
    }

    #[test]
    fn empty_structure_encodes_dummy_leaf() {
        let buffers = RenderBuffers::encode(&[], &build_bvh(&[]));
        assert!(buffers.segments.is_empty());
        assert_eq!(u32_at(&buffers.nodes, 24), 0);
        assert_eq!(u32_at(&buffers.nodes, 28), LEAF_FLAG);
        assert!(buffers.leaf_indices.is_empty());
    }

    #[test]
    fn blob_header_carries_record_counts() {
        let segments = two_segments();
        let buffers = RenderBuffers::encode(&segments, &build_bvh(&segments));
        let blob = buffers.to_bytes();
        assert_eq!(u32_at(&blob, 0), 2);
        assert_eq!(u32_at(&blob, 4), 1);
        assert_eq!(u32_at(&blob, 8), 2);
        assert_eq!(blob.len(), 12 + 2 * SEGMENT_STRIDE + NODE_STRIDE + 8);
    }

    #[test]
    fn skeleton_obj_links_vertex_pairs() {
        let obj = skeleton_obj(&two_segments());
        let lines: Vec<&str> = obj.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "v 0 1 0");
        assert_eq!(lines[3], "v 1 -1 0.5");
        assert_eq!(lines[4], "l 1 2");
        assert_eq!(lines[5], "l 3 4");
    }
}
