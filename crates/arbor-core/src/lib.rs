pub mod random_tree;
pub mod segment;
pub mod vector;

pub use random_tree::{RandomTreeConfig, random_branching};
pub use segment::{Aabb, CoreError, Segment, validate_forest};
pub use vector::{
    Point3, add, cross, distance, dot, length, lerp, mul_scalar, normalize, rotate_axis, sub,
};
