use crate::centerline::Centerline;
use crate::error::InputError;
use crate::frames::{AxialFrame, axial_frames};
use crate::geometry::{Point3D, Vector3D};
use crate::surface::Surface;

/// Parallel copies of a base surface.
///
/// Signed offset `k` in `[-n/2, n - n/2)` is stored at position `k + n/2`, so
/// slices are in spatial order along the stack direction.
#[derive(Debug, Clone)]
pub struct SliceStack {
    slices: Vec<Surface>,
}

impl SliceStack {
    /// Translate `surface` by `direction * dist_slices * k` for every offset.
    ///
    /// A single slice is the untouched base surface.
    pub fn create(
        surface: Surface,
        n_slices: usize,
        direction: Vector3D,
        dist_slices: f64,
    ) -> Result<Self, InputError> {
        if n_slices == 0 {
            return Err(InputError::InvalidSliceCount(0));
        }
        if !dist_slices.is_finite() || dist_slices < 0.0 {
            return Err(InputError::InvalidSliceDistance(dist_slices as f32));
        }
        if !direction.iter().all(|v| v.is_finite()) {
            return Err(InputError::InvalidStackDirection);
        }
        if n_slices == 1 {
            return Ok(Self {
                slices: vec![surface],
            });
        }

        let step = direction * dist_slices;
        let slices = (0..n_slices)
            .map(|position| surface.translate(&(step * Self::offset(position, n_slices) as f64)))
            .collect();
        Ok(Self { slices })
    }

    /// Signed offset of the slice stored at `position`
    pub fn offset(position: usize, n_slices: usize) -> i64 {
        position as i64 - (n_slices / 2) as i64
    }

    pub fn slices(&self) -> &[Surface] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn squash(&self, reverse: bool) -> Vec<Point3D> {
        squash(&self.slices, reverse)
    }
}

/// Square cross-section planes along a centerline with their orientation
#[derive(Debug, Clone)]
pub struct AxialStack {
    planes: Vec<Surface>,
    frames: Vec<AxialFrame>,
    side_length: f64,
    resolution: usize,
}

impl AxialStack {
    /// One `resolution × resolution` plane per centerline segment, centered
    /// on the segment start and perpendicular to the segment.
    pub fn create(
        centerline: &Centerline,
        side_length: f64,
        resolution: usize,
    ) -> Result<Self, InputError> {
        if !side_length.is_finite() || side_length <= 0.0 {
            return Err(InputError::InvalidSideLength(side_length as f32));
        }
        if resolution < 2 {
            return Err(InputError::InvalidResolution(resolution as u32));
        }

        let frames = axial_frames(centerline);
        let planes = frames
            .iter()
            .map(|frame| oriented_plane(frame, side_length, resolution))
            .collect();
        Ok(Self {
            planes,
            frames,
            side_length,
            resolution,
        })
    }

    pub fn planes(&self) -> &[Surface] {
        &self.planes
    }

    pub fn frames(&self) -> &[AxialFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Distance between neighbouring plane samples
    pub fn pixel_spacing(&self) -> f64 {
        self.side_length / self.resolution as f64
    }

    /// Concatenated image orientations, 6 floats per frame
    pub fn iop(&self) -> Vec<f32> {
        self.frames.iter().flat_map(|f| f.iop()).collect()
    }

    /// Concatenated image positions, 3 floats per frame
    pub fn ipp(&self) -> Vec<f32> {
        self.frames.iter().flat_map(|f| f.ipp()).collect()
    }

    pub fn squash(&self, reverse: bool) -> Vec<Point3D> {
        squash(&self.planes, reverse)
    }
}

/// Square grid centered on the frame origin: rows along `v`, columns along `u`
fn oriented_plane(frame: &AxialFrame, side_length: f64, resolution: usize) -> Surface {
    let spacing = side_length / resolution as f64;
    let half = (resolution / 2) as f64;
    let points = (0..resolution)
        .flat_map(|row| {
            (0..resolution).map(move |col| {
                frame.origin
                    + frame.u * ((col as f64 - half) * spacing)
                    + frame.v * ((row as f64 - half) * spacing)
            })
        })
        .collect();
    Surface::from_grid(resolution, resolution, points)
}

/// All points of `surfaces` in one traversal, ascending or descending by
/// surface index. Point order within a surface is kept.
pub fn squash(surfaces: &[Surface], reverse: bool) -> Vec<Point3D> {
    let total = surfaces.iter().map(Surface::num_points).sum();
    let mut points = Vec::with_capacity(total);
    if reverse {
        for surface in surfaces.iter().rev() {
            points.extend_from_slice(surface.points());
        }
    } else {
        for surface in surfaces {
            points.extend_from_slice(surface.points());
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::DirectionField;
    use crate::surface::SweepLayout;
    use proptest::prelude::*;

    fn base_surface() -> Surface {
        let centerline = Centerline::from_points(vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(1.0, 0.5, 0.0),
            Point3D::new(2.0, 0.0, 0.5),
        ])
        .unwrap();
        Surface::sweep(
            &centerline,
            &DirectionField::Fixed(Vector3D::y()),
            SweepLayout::one_sided(4.0, 4),
        )
        .unwrap()
    }

    #[test]
    fn test_single_slice_is_base_surface() {
        let base = base_surface();
        let stack = SliceStack::create(base.clone(), 1, Vector3D::z(), 3.0).unwrap();

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.slices()[0], base);
        assert_eq!(stack.squash(false), base.points());
    }

    #[test]
    fn test_even_stack_offsets() {
        let base = base_surface();
        let stack = SliceStack::create(base.clone(), 4, Vector3D::z(), 2.0).unwrap();

        assert_eq!(stack.len(), 4);
        // offsets -2, -1, 0, 1
        assert_eq!(stack.slices()[2], base);
        let shift = stack.slices()[0].points()[0] - base.points()[0];
        assert!((shift - Vector3D::new(0.0, 0.0, -4.0)).norm() < 1e-12);
    }

    #[test]
    fn test_odd_stack_has_n_slices() {
        let stack = SliceStack::create(base_surface(), 3, Vector3D::x(), 1.0).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!((0..3).map(|p| SliceStack::offset(p, 3)).collect::<Vec<_>>(), vec![-1, 0, 1]);
    }

    #[test]
    fn test_invalid_stack_parameters() {
        assert_eq!(
            SliceStack::create(base_surface(), 0, Vector3D::z(), 1.0).err(),
            Some(InputError::InvalidSliceCount(0))
        );
        assert!(SliceStack::create(base_surface(), 2, Vector3D::z(), -1.0).is_err());
        assert!(SliceStack::create(base_surface(), 2, Vector3D::new(f64::NAN, 0.0, 0.0), 1.0).is_err());
    }

    #[test]
    fn test_squash_order() {
        let stack = SliceStack::create(base_surface(), 2, Vector3D::z(), 1.0).unwrap();
        let n = stack.slices()[0].num_points();

        let forward = stack.squash(false);
        let backward = stack.squash(true);
        assert_eq!(forward.len(), 2 * n);
        assert_eq!(&forward[..n], stack.slices()[0].points());
        assert_eq!(&backward[..n], stack.slices()[1].points());
        assert_eq!(&backward[n..], stack.slices()[0].points());
    }

    #[test]
    fn test_axial_stack() {
        let points: Vec<Point3D> = (0..6).map(|i| Point3D::new(0.0, 0.0, i as f64 * 2.0)).collect();
        let centerline = Centerline::from_points(points).unwrap();
        let stack = AxialStack::create(&centerline, 120.0, 8).unwrap();

        assert_eq!(stack.len(), 5);
        assert_eq!(stack.iop().len(), 30);
        assert_eq!(stack.ipp().len(), 15);
        assert_eq!(&stack.ipp()[3..6], &[0.0, 0.0, 2.0]);
        assert_eq!(stack.pixel_spacing(), 15.0);

        for (plane, frame) in stack.planes().iter().zip(stack.frames()) {
            assert_eq!(plane.num_points(), 64);
            // every sample lies in the plane through the frame origin
            for p in plane.points() {
                assert!((p - frame.origin).dot(&frame.tangent).abs() < 1e-9);
            }
            // center sample is the frame origin
            assert!((plane.point(4, 4) - frame.origin).norm() < 1e-9);
        }
        assert_eq!(stack.squash(false).len(), 5 * 64);
    }

    proptest! {
        #[test]
        fn prop_slices_differ_by_offset(
            n in 1usize..9,
            dist in 0.0f64..10.0,
            dx in -1.0f64..1.0,
            dy in -1.0f64..1.0,
            dz in -1.0f64..1.0,
        ) {
            let direction = Vector3D::new(dx, dy, dz);
            let stack = SliceStack::create(base_surface(), n, direction, dist).unwrap();
            prop_assert_eq!(stack.len(), n);

            for i in 0..n {
                for j in 0..n {
                    let k = (SliceStack::offset(i, n) - SliceStack::offset(j, n)) as f64;
                    let expected = direction * dist * k;
                    let a = stack.slices()[i].points();
                    let b = stack.slices()[j].points();
                    for (pa, pb) in a.iter().zip(b) {
                        prop_assert!(((pa - pb) - expected).norm() < 1e-9);
                    }
                }
            }
        }
    }
}
