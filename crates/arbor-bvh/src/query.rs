//! CPU versions of the renderer's point queries.

use arbor_core::{Point3, Segment};
use serde::Serialize;

use crate::{Bvh, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    pub segment: usize,
    /// Signed distance to the capsule surface; negative inside.
    pub distance: f64,
}

impl Bvh {
    /// Segments whose inflated boxes contain `point`, in leaf order.
    pub fn query_point(&self, segments: &[Segment], point: Point3) -> Vec<usize> {
        let mut hits = Vec::new();
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            if !node.bounds.contains_point(point) {
                continue;
            }
            match node.kind {
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::Leaf { .. } => {
                    hits.extend(
                        self.leaf_segments(node)
                            .iter()
                            .map(|&i| i as usize)
                            .filter(|&i| segments[i].bounds().contains_point(point)),
                    );
                }
            }
        }

        hits
    }

    /// Closest capsule surface to `point`, or `None` for an empty index.
    pub fn nearest(&self, segments: &[Segment], point: Point3) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            // A capsule is never closer than its box; inside a box nothing can
            // be ruled out because capsule distances may be negative.
            let box_distance = node.bounds.distance_to_point(point);
            if let Some(hit) = best
                && box_distance > hit.distance.max(0.0)
            {
                continue;
            }

            match node.kind {
                NodeKind::Internal { left, right } => {
                    let near_left = self.nodes[left].bounds.distance_to_point(point)
                        <= self.nodes[right].bounds.distance_to_point(point);
                    if near_left {
                        stack.push(right);
                        stack.push(left);
                    } else {
                        stack.push(left);
                        stack.push(right);
                    }
                }
                NodeKind::Leaf { .. } => {
                    for &member in self.leaf_segments(node) {
                        let segment = member as usize;
                        let distance = segments[segment].distance(point);
                        if best.is_none_or(|hit| distance < hit.distance) {
                            best = Some(Hit { segment, distance });
                        }
                    }
                }
            }
        }

        best
    }
}
