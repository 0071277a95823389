/// Cartesian point or direction in world space.
pub type Point3 = [f64; 3];

#[inline]
pub fn add(a: Point3, b: Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn mul_scalar(v: Point3, scalar: f64) -> Point3 {
    [v[0] * scalar, v[1] * scalar, v[2] * scalar]
}

#[inline]
pub fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn length(v: Point3) -> f64 {
    dot(v, v).sqrt()
}

#[inline]
pub fn distance(a: Point3, b: Point3) -> f64 {
    length(sub(a, b))
}

/// Unit vector along `v`, or `None` when `v` has (near) zero length.
#[inline]
pub fn normalize(v: Point3) -> Option<Point3> {
    let len = length(v);
    if len <= 1e-12 || !len.is_finite() {
        None
    } else {
        Some([v[0] / len, v[1] / len, v[2] / len])
    }
}

#[inline]
pub fn lerp(a: Point3, b: Point3, t: f64) -> Point3 {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Rotates `point` around `axis` by `angle` radians (Rodrigues' formula).
///
/// A degenerate axis leaves the point unchanged.
#[inline]
pub fn rotate_axis(point: Point3, axis: Point3, angle: f64) -> Point3 {
    let Some(a) = normalize(axis) else {
        return point;
    };
    let cos_theta = angle.cos();
    let sin_theta = angle.sin();
    let term1 = mul_scalar(point, cos_theta);
    let term2 = mul_scalar(cross(a, point), sin_theta);
    let term3 = mul_scalar(a, dot(a, point) * (1.0 - cos_theta));
    add(add(term1, term2), term3)
}
