//! Non-parametric fallback generator: fixed-depth random branching.
//!
//! Useful for exercising renderers and the spatial index without a grammar.

use rand::Rng;

use crate::segment::Segment;
use crate::vector::{Point3, add, mul_scalar, normalize, sub};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomTreeConfig {
    pub trunk_start: Point3,
    pub trunk_end: Point3,
    pub trunk_radius: f64,
    /// Remaining recursion levels of the trunk; nodes at level 1 are tips.
    pub levels: u32,
    /// Probability that a node spawns a single child instead of two.
    pub single_child_probability: f64,
    pub length_factor: f64,
    pub radius_factor: f64,
    /// Magnitude range (radians) of each child's two random bends.
    pub min_bend: f64,
    pub max_bend: f64,
}

impl Default for RandomTreeConfig {
    fn default() -> Self {
        Self {
            trunk_start: [0.0, -1.0, 0.0],
            trunk_end: [0.0, 0.0, 0.0],
            trunk_radius: 0.06,
            levels: 5,
            single_child_probability: 0.3,
            length_factor: 0.8,
            radius_factor: 0.7,
            min_bend: 0.3,
            max_bend: 1.0,
        }
    }
}

struct Pending {
    segment: Segment,
    levels: u32,
}

/// Grows a random tree depth-first; every child is emitted after its parent.
pub fn random_branching(rng: &mut impl Rng, config: &RandomTreeConfig) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(1 << config.levels.min(12));
    let mut stack = vec![Pending {
        segment: Segment::root(config.trunk_start, config.trunk_end, config.trunk_radius),
        levels: config.levels,
    }];

    while let Some(node) = stack.pop() {
        let index = segments.len();
        segments.push(node.segment);

        if node.levels <= 1 {
            continue;
        }

        let parent = node.segment;
        let axis = sub(parent.end, parent.start);
        let length = parent.length();
        let Some(direction) = normalize(axis) else {
            continue;
        };

        let child_count = if rng.gen_range(0.0_f64..1.0) < config.single_child_probability {
            1
        } else {
            2
        };
        let child_length = config.length_factor * length;

        for _ in 0..child_count {
            let yaw = signed_bend(rng, config);
            let pitch = signed_bend(rng, config);
            let bent = rotate_x(rotate_z(direction, yaw), pitch);

            stack.push(Pending {
                segment: Segment {
                    start: parent.end,
                    end: add(parent.end, mul_scalar(bent, child_length)),
                    radius: parent.radius * config.radius_factor,
                    depth: parent.depth + 1,
                    parent: Some(index),
                },
                levels: node.levels - 1,
            });
        }
    }

    segments
}

fn signed_bend(rng: &mut impl Rng, config: &RandomTreeConfig) -> f64 {
    let spread = config.max_bend - config.min_bend;
    let magnitude = config.min_bend + spread * rng.gen_range(0.0_f64..1.0);
    if rng.gen_range(0.0_f64..1.0) > 0.5 {
        -magnitude
    } else {
        magnitude
    }
}

#[inline]
fn rotate_z(v: Point3, angle: f64) -> Point3 {
    let (s, c) = angle.sin_cos();
    [c * v[0] - s * v[1], s * v[0] + c * v[1], v[2]]
}

#[inline]
fn rotate_x(v: Point3, angle: f64) -> Point3 {
    let (s, c) = angle.sin_cos();
    [v[0], c * v[1] - s * v[2], s * v[1] + c * v[2]]
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::segment::{Segment, validate_forest};

    use super::{RandomTreeConfig, random_branching};

    #[test]
    fn generated_tree_is_a_valid_forest() {
        let mut rng = StdRng::seed_from_u64(7);
        let segments = random_branching(&mut rng, &RandomTreeConfig::default());
        validate_forest(&segments).expect("random tree should be a forest");
        assert_eq!(segments[0].parent, None);
        assert!(segments.iter().skip(1).all(|s| s.parent.is_some()));
    }

    #[test]
    fn node_count_is_bounded_by_branching_factor() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = RandomTreeConfig::default();
        let segments = random_branching(&mut rng, &config);
        // Between a single chain and a full binary tree of `levels` levels.
        assert!(segments.len() >= config.levels as usize);
        assert!(segments.len() < 1 << config.levels);
        assert!(segments.iter().all(|s| s.depth < config.levels));
    }

    #[test]
    fn children_shrink_and_attach_to_parent_end() {
        let mut rng = StdRng::seed_from_u64(3);
        let segments = random_branching(&mut rng, &RandomTreeConfig::default());
        for child in segments.iter().filter(|s| s.parent.is_some()) {
            let parent: &Segment = &segments[child.parent.unwrap_or_default()];
            assert_eq!(child.start, parent.end);
            assert!((child.radius - parent.radius * 0.7).abs() < 1e-12);
            assert!((child.length() - parent.length() * 0.8).abs() < 1e-9);
        }
    }

    #[test]
    fn same_seed_gives_same_tree() {
        let config = RandomTreeConfig::default();
        let a = random_branching(&mut StdRng::seed_from_u64(99), &config);
        let b = random_branching(&mut StdRng::seed_from_u64(99), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_length_trunk_has_no_children() {
        let config = RandomTreeConfig {
            trunk_end: [0.0, -1.0, 0.0],
            ..RandomTreeConfig::default()
        };
        let segments = random_branching(&mut StdRng::seed_from_u64(1), &config);
        assert_eq!(segments.len(), 1);
    }
}
