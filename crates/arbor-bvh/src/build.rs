use arbor_core::{Aabb, Point3, Segment};

use crate::{Bvh, BvhNode, LEAF_CAPACITY, NodeKind};

struct Builder<'a> {
    boxes: &'a [Aabb],
    centroids: &'a [Point3],
    nodes: Vec<BvhNode>,
    leaf_indices: Vec<u32>,
}

/// Builds a median-split hierarchy over the segments' radius-inflated boxes.
///
/// Empty input yields a single empty leaf with a zero box, so consumers can
/// always read node 0.
pub fn build_bvh(segments: &[Segment]) -> Bvh {
    if segments.is_empty() {
        return Bvh {
            nodes: vec![BvhNode {
                bounds: Aabb::zero(),
                kind: NodeKind::Leaf { start: 0, count: 0 },
            }],
            leaf_indices: Vec::new(),
        };
    }

    let boxes: Vec<Aabb> = segments.iter().map(Segment::bounds).collect();
    let centroids: Vec<Point3> = boxes.iter().map(Aabb::center).collect();
    let mut indices: Vec<u32> = (0..segments.len() as u32).collect();

    let mut builder = Builder {
        boxes: &boxes,
        centroids: &centroids,
        nodes: Vec::with_capacity(2 * segments.len() / LEAF_CAPACITY + 1),
        leaf_indices: Vec::with_capacity(segments.len()),
    };
    builder.build_node(&mut indices);

    Bvh {
        nodes: builder.nodes,
        leaf_indices: builder.leaf_indices,
    }
}

impl Builder<'_> {
    fn build_node(&mut self, indices: &mut [u32]) -> usize {
        let slot = self.nodes.len();
        // Reserve the slot so a parent always precedes its children.
        self.nodes.push(BvhNode {
            bounds: Aabb::zero(),
            kind: NodeKind::Leaf { start: 0, count: 0 },
        });

        let mut bounds = Aabb::empty();
        for &index in indices.iter() {
            bounds.grow(&self.boxes[index as usize]);
        }

        if indices.len() <= LEAF_CAPACITY {
            let start = self.leaf_indices.len();
            self.leaf_indices.extend_from_slice(indices);
            self.nodes[slot] = BvhNode {
                bounds,
                kind: NodeKind::Leaf {
                    start,
                    count: indices.len(),
                },
            };
            return slot;
        }

        let axis = bounds.longest_axis();
        let mid = indices.len() / 2;
        let centroids = self.centroids;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
        });

        let (lower, upper) = indices.split_at_mut(mid);
        let left = self.build_node(lower);
        let right = self.build_node(upper);

        self.nodes[slot] = BvhNode {
            bounds,
            kind: NodeKind::Internal { left, right },
        };
        slot
    }
}

#[cfg(test)]
mod tests {
    use arbor_core::{Aabb, RandomTreeConfig, Segment, random_branching};
    use arbor_grammar::{PresetLibrary, RewriteConfig, generate_seeded};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::build_bvh;
    use crate::{Bvh, LEAF_CAPACITY, NodeKind};

    /// Walks the tree checking containment, leaf sizes and exactly-once coverage.
    fn check_invariants(bvh: &Bvh, segments: &[Segment]) {
        let mut seen = vec![0usize; segments.len()];
        let mut stack = vec![0usize];
        let mut visited = 0;

        while let Some(index) = stack.pop() {
            visited += 1;
            let node = &bvh.nodes[index];
            match node.kind {
                NodeKind::Internal { left, right } => {
                    assert!(left > index && right > index, "children follow parent");
                    for child in [left, right] {
                        assert!(node.bounds.contains(&bvh.nodes[child].bounds));
                        stack.push(child);
                    }
                }
                NodeKind::Leaf { .. } => {
                    let members = bvh.leaf_segments(node);
                    assert!(!members.is_empty() && members.len() <= LEAF_CAPACITY);
                    for &member in members {
                        seen[member as usize] += 1;
                        assert!(node.bounds.contains(&segments[member as usize].bounds()));
                    }
                }
            }
        }

        assert_eq!(visited, bvh.nodes.len(), "every node is reachable");
        assert!(seen.iter().all(|&count| count == 1), "each segment in one leaf");
        assert_eq!(bvh.leaf_indices.len(), segments.len());
    }

    #[test]
    fn empty_input_builds_dummy_leaf() {
        let bvh = build_bvh(&[]);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].bounds, Aabb::zero());
        assert_eq!(bvh.nodes[0].kind, NodeKind::Leaf { start: 0, count: 0 });
        assert!(bvh.leaf_indices.is_empty());
    }

    #[test]
    fn single_segment_is_one_leaf() {
        let segment = Segment::root([0.0, 0.0, 0.0], [1.0, 2.0, 3.0], 0.5);
        let bvh = build_bvh(&[segment]);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].kind, NodeKind::Leaf { start: 0, count: 1 });
        assert_eq!(bvh.nodes[0].bounds, segment.bounds());
        assert_eq!(bvh.leaf_indices, vec![0]);
    }

    #[test]
    fn nine_segments_split_into_two_leaves() {
        let segments: Vec<Segment> = (0..9)
            .map(|i| Segment::root([i as f64, 0.0, 0.0], [i as f64 + 0.5, 0.0, 0.0], 0.1))
            .collect();
        let bvh = build_bvh(&segments);
        assert_eq!(bvh.nodes.len(), 3);
        assert_eq!(bvh.nodes[0].kind, NodeKind::Internal { left: 1, right: 2 });
        check_invariants(&bvh, &segments);

        // Lower median goes left: the four smallest x centroids.
        let mut left: Vec<u32> = bvh.leaf_segments(&bvh.nodes[1]).to_vec();
        left.sort_unstable();
        assert_eq!(left, vec![0, 1, 2, 3]);
    }

    #[test]
    fn random_trees_satisfy_invariants() {
        for seed in 0..8 {
            let config = RandomTreeConfig {
                levels: 9,
                ..RandomTreeConfig::default()
            };
            let segments = random_branching(&mut StdRng::seed_from_u64(seed), &config);
            let bvh = build_bvh(&segments);
            check_invariants(&bvh, &segments);
        }
    }

    #[test]
    fn coincident_segments_still_partition() {
        let segments = vec![Segment::root([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], 0.1); 40];
        let bvh = build_bvh(&segments);
        check_invariants(&bvh, &segments);
        assert!(bvh.nodes.len() > 1);
    }

    #[test]
    fn generated_presets_index_cleanly() {
        let library = PresetLibrary::builtin().expect("built-in presets should parse");
        for grammar in library.grammars() {
            let generation = generate_seeded(grammar, &RewriteConfig::default(), 5)
                .expect("preset should generate");
            let bvh = build_bvh(&generation.segments);
            check_invariants(&bvh, &generation.segments);
        }
    }
}
