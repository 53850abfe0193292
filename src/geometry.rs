use nalgebra::{Point3, Vector3};

/// 3D point type
pub type Point3D = Point3<f64>;

/// 3D vector type
pub type Vector3D = Vector3<f64>;

/// Lengths below this are treated as zero
pub const EPSILON: f64 = 1e-10;

/// Infinite plane given by a point on it and a unit normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub origin: Point3D,
    pub normal: Vector3D,
}

impl Plane {
    /// Build a plane, normalizing `normal`. Returns `None` for a zero normal.
    pub fn new(origin: Point3D, normal: Vector3D) -> Option<Self> {
        let norm = normal.norm();
        if norm < EPSILON || !norm.is_finite() {
            return None;
        }
        Some(Self {
            origin,
            normal: normal / norm,
        })
    }

    pub fn signed_distance(&self, point: &Point3D) -> f64 {
        (point - self.origin).dot(&self.normal)
    }

    /// Orthogonal projection of `point` onto the plane
    pub fn project(&self, point: &Point3D) -> Point3D {
        point - self.normal * self.signed_distance(point)
    }
}

/// Normalize `v`, or `None` when it has no usable direction
pub fn try_normalize(v: &Vector3D) -> Option<Vector3D> {
    let norm = v.norm();
    if norm < EPSILON || !norm.is_finite() {
        None
    } else {
        Some(v / norm)
    }
}

#[inline]
pub fn to_f32_array(v: &Vector3D) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}
