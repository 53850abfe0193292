use crate::centerline::Centerline;
use crate::enums::Axis;
use crate::error::InputError;
use crate::geometry::{Point3D, Vector3D, to_f32_array, try_normalize};
use crate::volume::Volume;

/// Sweep direction for every centerline row
#[derive(Debug, Clone, PartialEq)]
pub enum DirectionField {
    /// One global unit vector
    Fixed(Vector3D),
    /// One unit vector per centerline point
    PerPoint(Vec<Vector3D>),
}

impl DirectionField {
    pub fn fixed(axis: Axis) -> Self {
        DirectionField::Fixed(axis.unit())
    }

    /// Build a per-point field from a flat `x, y, z, ...` list.
    ///
    /// Exactly `points` vectors are required; each is normalized.
    pub fn per_point(flat: &[f32], points: usize) -> Result<Self, InputError> {
        if flat.len() != 3 * points {
            return Err(InputError::DirectionFieldLength {
                expected: 3 * points,
                found: flat.len(),
            });
        }
        let vectors = flat
            .chunks_exact(3)
            .enumerate()
            .map(|(i, c)| {
                try_normalize(&Vector3D::new(c[0] as f64, c[1] as f64, c[2] as f64))
                    .ok_or(InputError::ZeroDirection(i))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DirectionField::PerPoint(vectors))
    }

    /// Direction used for centerline row `row`
    pub fn at(&self, row: usize) -> Vector3D {
        match self {
            DirectionField::Fixed(direction) => *direction,
            DirectionField::PerPoint(directions) => directions[row],
        }
    }

    /// Number of rows the field can serve, `None` for a fixed field
    pub fn len(&self) -> Option<usize> {
        match self {
            DirectionField::Fixed(_) => None,
            DirectionField::PerPoint(directions) => Some(directions.len()),
        }
    }
}

/// Sweep distance for a fixed axis: the volume extent along it
pub fn sweep_distance(volume: &Volume, axis: Axis) -> f64 {
    volume.extent(axis)
}

/// Oriented cross-section frame for one centerline segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxialFrame {
    /// First point of the segment
    pub origin: Point3D,
    /// Forward difference to the next point, not normalized
    pub normal: Vector3D,
    /// Unit tangent the in-plane axes are derived from
    pub tangent: Vector3D,
    /// In-plane column axis
    pub u: Vector3D,
    /// In-plane row axis
    pub v: Vector3D,
}

impl AxialFrame {
    fn new(origin: Point3D, normal: Vector3D, tangent: Vector3D) -> Self {
        let (u, v) = in_plane_axes(&tangent);
        Self {
            origin,
            normal,
            tangent,
            u,
            v,
        }
    }

    /// Image orientation: `u` followed by `v`
    pub fn iop(&self) -> [f32; 6] {
        let [ux, uy, uz] = to_f32_array(&self.u);
        let [vx, vy, vz] = to_f32_array(&self.v);
        [ux, uy, uz, vx, vy, vz]
    }

    /// Image position: the frame origin
    pub fn ipp(&self) -> [f32; 3] {
        to_f32_array(&self.origin.coords)
    }
}

/// Two unit axes orthogonal to `tangent` and to each other, `u × v = tangent`.
///
/// The reference is the world axis least aligned with the tangent.
pub fn in_plane_axes(tangent: &Vector3D) -> (Vector3D, Vector3D) {
    let abs = tangent.abs();
    let reference = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3D::x()
    } else if abs.y <= abs.z {
        Vector3D::y()
    } else {
        Vector3D::z()
    };
    let u = (reference - tangent * reference.dot(tangent)).normalize();
    let v = tangent.cross(&u);
    (u, v)
}

/// One frame per segment of `centerline`.
///
/// A zero-length segment reuses the previous segment's tangent; leading
/// zero-length segments take the first valid tangent after them, and a
/// centerline without any valid segment falls back to +z.
pub fn axial_frames(centerline: &Centerline) -> Vec<AxialFrame> {
    let points = centerline.points();
    let normals: Vec<Vector3D> = points.windows(2).map(|w| w[1] - w[0]).collect();

    let first_valid = normals.iter().find_map(try_normalize).unwrap_or_else(|| {
        log::warn!("Centerline has no segment of non-zero length, using +z tangent");
        Vector3D::z()
    });

    let mut previous = first_valid;
    let mut fallbacks = 0;
    let frames = normals
        .iter()
        .enumerate()
        .map(|(i, normal)| {
            let tangent = match try_normalize(normal) {
                Some(t) => t,
                None => {
                    fallbacks += 1;
                    previous
                }
            };
            previous = tangent;
            AxialFrame::new(points[i], *normal, tangent)
        })
        .collect();

    if fallbacks > 0 {
        log::warn!("{fallbacks} zero-length centerline segments reused a neighbouring tangent");
    }
    frames
}
