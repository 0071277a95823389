use arbor_core::{Segment, distance};

/// Radius per unit of reach in medial-axis mode.
pub const MEDIAL_RADIUS_SCALE: f64 = 1e-8;

/// Rewrites every radius from the segment's reach: the largest distance from
/// its start to its own end or to the end of any descendant, scaled by the
/// noise `noise(index)` that segment was drawn with.
pub fn apply_medial_axis(segments: &mut [Segment], noise: impl Fn(usize) -> f64) {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); segments.len()];
    for (index, segment) in segments.iter().enumerate() {
        if let Some(parent) = segment.parent
            && parent < segments.len()
        {
            children[parent].push(index);
        }
    }

    let mut stack = Vec::new();
    let reaches: Vec<f64> = (0..segments.len())
        .map(|index| {
            let origin = segments[index].start;
            let mut reach = distance(origin, segments[index].end);
            stack.clear();
            stack.extend_from_slice(&children[index]);
            while let Some(descendant) = stack.pop() {
                reach = reach.max(distance(origin, segments[descendant].end));
                stack.extend_from_slice(&children[descendant]);
            }
            reach
        })
        .collect();

    for (index, (segment, reach)) in segments.iter_mut().zip(reaches).enumerate() {
        segment.radius = MEDIAL_RADIUS_SCALE * reach * noise(index);
    }
}
