use crate::enums::Axis;
use crate::geometry::Point3D;
use crate::interpolator::Interpolator;
use crate::volume_loader::VolumeLoaderError;

use ndarray::Array3;
use ndarray::parallel::prelude::*;

/// Value returned for sample points outside the volume bounds
pub const OUT_OF_BOUNDS_VALUE: f32 = 0.0;

/// Slack, in voxels, accepted at the volume bounds
const BOUNDS_TOLERANCE: f64 = 1e-6;

/// Scalar voxel grid with axis-aligned world geometry.
///
/// Data is indexed `(z, y, x)`, origin and spacing are `(x, y, z)`.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    origin: [f64; 3],
    spacing: [f64; 3],
    scalar_range: (f32, f32),
}

/// Geometry summary of a volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMetadata {
    pub origin: [f64; 3],
    /// `[nx, ny, nz]`
    pub dims: [usize; 3],
    /// `[xmin, xmax, ymin, ymax, zmin, zmax]`
    pub bounds: [f64; 6],
}

impl VolumeMetadata {
    /// Flatten to origin×3, dims×3, bounds×6
    pub fn to_vec(&self) -> Vec<f32> {
        self.origin
            .iter()
            .map(|&v| v as f32)
            .chain(self.dims.iter().map(|&d| d as f32))
            .chain(self.bounds.iter().map(|&v| v as f32))
            .collect()
    }
}

impl Volume {
    pub fn new(
        data: Array3<f32>,
        origin: [f64; 3],
        spacing: [f64; 3],
    ) -> Result<Self, VolumeLoaderError> {
        if data.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0)
            || origin.iter().any(|o| !o.is_finite())
        {
            return Err(VolumeLoaderError::InvalidGeometry);
        }

        let scalar_range = data
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );

        Ok(Self {
            data,
            origin,
            spacing,
            scalar_range,
        })
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Voxel counts as `[nx, ny, nz]`
    pub fn dims(&self) -> [usize; 3] {
        let (depth, height, width) = self.data.dim();
        [width, height, depth]
    }

    pub fn bounds(&self) -> [f64; 6] {
        let dims = self.dims();
        let mut bounds = [0.0; 6];
        for axis in 0..3 {
            bounds[2 * axis] = self.origin[axis];
            bounds[2 * axis + 1] = self.origin[axis] + (dims[axis] - 1) as f64 * self.spacing[axis];
        }
        bounds
    }

    pub fn metadata(&self) -> VolumeMetadata {
        VolumeMetadata {
            origin: self.origin,
            dims: self.dims(),
            bounds: self.bounds(),
        }
    }

    /// Minimum and maximum voxel value
    pub fn scalar_range(&self) -> (f32, f32) {
        self.scalar_range
    }

    /// Physical size of the volume along `axis`
    pub fn extent(&self, axis: Axis) -> f64 {
        let bounds = self.bounds();
        bounds[2 * axis.index() + 1] - bounds[2 * axis.index()]
    }

    /// Continuous voxel index `(x, y, z)` of a world point
    fn continuous_index(&self, point: &Point3D) -> [f64; 3] {
        [
            (point.x - self.origin[0]) / self.spacing[0],
            (point.y - self.origin[1]) / self.spacing[1],
            (point.z - self.origin[2]) / self.spacing[2],
        ]
    }

    pub fn contains(&self, point: &Point3D) -> bool {
        let index = self.continuous_index(point);
        let dims = self.dims();
        index.iter().zip(dims.iter()).all(|(&i, &n)| {
            i.is_finite() && i >= -BOUNDS_TOLERANCE && i <= (n - 1) as f64 + BOUNDS_TOLERANCE
        })
    }

    /// Trilinearly interpolated value at a world point.
    ///
    /// Points outside the bounds yield [`OUT_OF_BOUNDS_VALUE`].
    pub fn sample(&self, point: &Point3D) -> f32 {
        self.try_sample(point).unwrap_or(OUT_OF_BOUNDS_VALUE)
    }

    /// Interpolated value, `None` outside the bounds
    pub fn try_sample(&self, point: &Point3D) -> Option<f32> {
        if !self.contains(point) {
            return None;
        }
        let dims = self.dims();
        let [x, y, z] = self.continuous_index(point);
        let clamp = |i: f64, n: usize| i.max(0.0).min((n - 1) as f64);

        Some(Interpolator::trilinear_interpolate(
            &self.data,
            clamp(z, dims[2]),
            clamp(y, dims[1]),
            clamp(x, dims[0]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_volume() -> Volume {
        // value = x index, spacing 2 along x
        let data = Array3::from_shape_fn((4, 5, 6), |(_, _, x)| x as f32);
        Volume::new(data, [10.0, 0.0, -5.0], [2.0, 1.0, 0.5]).unwrap()
    }

    #[test]
    fn test_metadata_layout() {
        let volume = ramp_volume();
        let metadata = volume.metadata();

        assert_eq!(metadata.dims, [6, 5, 4]);
        assert_eq!(metadata.bounds, [10.0, 20.0, 0.0, 4.0, -5.0, -3.5]);
        assert_eq!(
            metadata.to_vec(),
            vec![10.0, 0.0, -5.0, 6.0, 5.0, 4.0, 10.0, 20.0, 0.0, 4.0, -5.0, -3.5]
        );
        assert_eq!(volume.extent(Axis::X), 10.0);
        assert_eq!(volume.scalar_range(), (0.0, 5.0));
    }

    #[test]
    fn test_sample_world_coordinates() {
        let volume = ramp_volume();

        assert!((volume.sample(&Point3D::new(13.0, 2.0, -4.0)) - 1.5).abs() < 1e-6);
        // upper bound is inclusive
        assert!((volume.sample(&Point3D::new(20.0, 4.0, -3.5)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_bounds_sentinel() {
        let volume = ramp_volume();

        assert_eq!(volume.sample(&Point3D::new(9.0, 2.0, -4.0)), OUT_OF_BOUNDS_VALUE);
        assert_eq!(volume.try_sample(&Point3D::new(9.0, 2.0, -4.0)), None);
        assert_eq!(volume.try_sample(&Point3D::new(10.0, 0.0, -5.0)), Some(0.0));
        assert_eq!(volume.sample(&Point3D::new(12.0, 4.5, -4.0)), OUT_OF_BOUNDS_VALUE);
        assert_eq!(
            volume.sample(&Point3D::new(f64::NAN, 0.0, -4.0)),
            OUT_OF_BOUNDS_VALUE
        );
    }

    #[test]
    fn test_rejects_bad_spacing() {
        let data = Array3::<f32>::zeros((2, 2, 2));
        assert!(matches!(
            Volume::new(data, [0.0; 3], [1.0, 0.0, 1.0]),
            Err(VolumeLoaderError::InvalidGeometry)
        ));
    }
}
