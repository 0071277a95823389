use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::{Point3, distance, dot, length, mul_scalar, sub};

/// One straight cylindrical piece of a generated branch structure.
///
/// Segments live in a flat arena and refer to their parent by index, so a
/// whole plant is a plain `Vec<Segment>` that can be shipped to a renderer
/// as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point3,
    pub end: Point3,
    pub radius: f64,
    /// Generation depth: 0 for roots, parent depth + 1 otherwise.
    pub depth: u32,
    pub parent: Option<usize>,
}

impl Segment {
    pub fn root(start: Point3, end: Point3, radius: f64) -> Self {
        Self {
            start,
            end,
            radius,
            depth: 0,
            parent: None,
        }
    }

    pub fn length(&self) -> f64 {
        distance(self.start, self.end)
    }

    /// Endpoints' bounds inflated by the radius on every axis.
    pub fn bounds(&self) -> Aabb {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = self.start[axis].min(self.end[axis]) - self.radius;
            max[axis] = self.start[axis].max(self.end[axis]) + self.radius;
        }
        Aabb { min, max }
    }

    /// Signed distance from `point` to the capsule swept by this segment.
    pub fn distance(&self, point: Point3) -> f64 {
        let pa = sub(point, self.start);
        let ba = sub(self.end, self.start);
        let ba_dot = dot(ba, ba);
        if ba_dot <= f64::EPSILON {
            return length(pa) - self.radius;
        }
        let h = (dot(pa, ba) / ba_dot).clamp(0.0, 1.0);
        length(sub(pa, mul_scalar(ba, h))) - self.radius
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    /// Inverted box that any union overwrites.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn zero() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.grow(other);
        out
    }

    pub fn grow(&mut self, other: &Aabb) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    pub fn extent(&self) -> Point3 {
        sub(self.max, self.min)
    }

    pub fn center(&self) -> Point3 {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Axis of largest extent. Ties favour the later axis:
    /// `x > y ? (x > z ? 0 : 2) : (y > z ? 1 : 2)`.
    pub fn longest_axis(&self) -> usize {
        let [x, y, z] = self.extent();
        if x > y {
            if x > z { 0 } else { 2 }
        } else if y > z {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    pub fn contains_point(&self, point: Point3) -> bool {
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    /// Euclidean distance from `point` to the box (0 inside).
    pub fn distance_to_point(&self, point: Point3) -> f64 {
        let mut outside = [0.0; 3];
        for axis in 0..3 {
            outside[axis] = (self.min[axis] - point[axis])
                .max(point[axis] - self.max[axis])
                .max(0.0);
        }
        length(outside)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("segment {index} refers to parent {parent}, which is not emitted before it")]
    ParentOutOfOrder { index: usize, parent: usize },

    #[error("segment {index} has depth {depth}, expected {expected}")]
    DepthMismatch {
        index: usize,
        depth: u32,
        expected: u32,
    },

    #[error("segment {index} has invalid radius {radius}")]
    InvalidRadius { index: usize, radius: f64 },
}

/// Checks that `segments` form a forest: every parent precedes its child and
/// depths grow by exactly one along each parent link.
pub fn validate_forest(segments: &[Segment]) -> Result<(), CoreError> {
    for (index, segment) in segments.iter().enumerate() {
        if segment.radius.is_nan() || segment.radius < 0.0 {
            return Err(CoreError::InvalidRadius {
                index,
                radius: segment.radius,
            });
        }

        let expected = match segment.parent {
            None => 0,
            Some(parent) if parent < index => segments[parent].depth + 1,
            Some(parent) => return Err(CoreError::ParentOutOfOrder { index, parent }),
        };

        if segment.depth != expected {
            return Err(CoreError::DepthMismatch {
                index,
                depth: segment.depth,
                expected,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Aabb, CoreError, Segment, validate_forest};

    fn chain(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment {
                start: [0.0, i as f64, 0.0],
                end: [0.0, i as f64 + 1.0, 0.0],
                radius: 0.1,
                depth: i as u32,
                parent: i.checked_sub(1),
            })
            .collect()
    }

    #[test]
    fn bounds_are_inflated_by_radius() {
        let segment = Segment::root([0.0, 0.0, 0.0], [1.0, -2.0, 0.5], 0.25);
        let bounds = segment.bounds();
        assert_eq!(bounds.min, [-0.25, -2.25, -0.25]);
        assert_eq!(bounds.max, [1.25, 0.25, 0.75]);
    }

    #[test]
    fn capsule_distance_is_signed() {
        let segment = Segment::root([0.0, 0.0, 0.0], [0.0, 2.0, 0.0], 0.5);
        assert!((segment.distance([0.0, 1.0, 0.0]) + 0.5).abs() < 1e-12);
        assert!((segment.distance([1.5, 1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((segment.distance([0.0, 3.0, 0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn longest_axis_breaks_ties_towards_z() {
        let cube = Aabb {
            min: [0.0; 3],
            max: [1.0; 3],
        };
        assert_eq!(cube.longest_axis(), 2);

        let wide = Aabb {
            min: [0.0; 3],
            max: [3.0, 1.0, 1.0],
        };
        assert_eq!(wide.longest_axis(), 0);

        let tall = Aabb {
            min: [0.0; 3],
            max: [1.0, 3.0, 1.0],
        };
        assert_eq!(tall.longest_axis(), 1);
    }

    #[test]
    fn empty_box_is_identity_for_union() {
        let b = Aabb {
            min: [-1.0, 0.0, 2.0],
            max: [1.0, 1.0, 3.0],
        };
        assert!(Aabb::empty().is_empty());
        assert_eq!(Aabb::empty().union(&b), b);
        assert!(b.contains(&b));
    }

    #[test]
    fn point_distance_is_zero_inside() {
        let b = Aabb {
            min: [0.0; 3],
            max: [1.0; 3],
        };
        assert_eq!(b.distance_to_point([0.5, 0.5, 0.5]), 0.0);
        assert!((b.distance_to_point([2.0, 0.5, 0.5]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn chain_is_a_valid_forest() {
        validate_forest(&chain(5)).expect("chain should validate");
    }

    #[test]
    fn forward_parent_reference_is_rejected() {
        let mut segments = chain(3);
        segments[1].parent = Some(2);
        assert_eq!(
            validate_forest(&segments),
            Err(CoreError::ParentOutOfOrder {
                index: 1,
                parent: 2
            })
        );
    }

    #[test]
    fn depth_gap_is_rejected() {
        let mut segments = chain(3);
        segments[2].depth = 7;
        assert!(matches!(
            validate_forest(&segments),
            Err(CoreError::DepthMismatch { index: 2, .. })
        ));
    }
}
