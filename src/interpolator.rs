use ndarray::Array3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Trilinear interpolation at continuous index `(z, y, x)`.
    ///
    /// Coordinates must lie inside `[0, dim - 1]` on every axis; the upper
    /// neighbours are clamped so the last voxel plane can be sampled exactly.
    #[inline]
    pub(crate) fn trilinear_interpolate(data: &Array3<f32>, z: f64, y: f64, x: f64) -> f32 {
        let (depth, height, width) = data.dim();

        let z0 = (z.floor() as usize).min(depth - 1);
        let y0 = (y.floor() as usize).min(height - 1);
        let x0 = (x.floor() as usize).min(width - 1);
        let z1 = (z0 + 1).min(depth - 1);
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dz = (z - z0 as f64) as f32;
        let dy = (y - y0 as f64) as f32;
        let dx = (x - x0 as f64) as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let v000 = data[[z0, y0, x0]];
        let v001 = data[[z0, y0, x1]];
        let v010 = data[[z0, y1, x0]];
        let v011 = data[[z0, y1, x1]];
        let v100 = data[[z1, y0, x0]];
        let v101 = data[[z1, y0, x1]];
        let v110 = data[[z1, y1, x0]];
        let v111 = data[[z1, y1, x1]];

        let v00 = v000.mul_add(one_minus_dx, v001 * dx);
        let v01 = v010.mul_add(one_minus_dx, v011 * dx);
        let v10 = v100.mul_add(one_minus_dx, v101 * dx);
        let v11 = v110.mul_add(one_minus_dx, v111 * dx);

        let v0 = v00.mul_add(one_minus_dy, v01 * dy);
        let v1 = v10.mul_add(one_minus_dy, v11 * dy);

        v0.mul_add(one_minus_dz, v1 * dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Array3<f32> {
        // value = x + 10 y + 100 z
        Array3::from_shape_fn((3, 3, 3), |(z, y, x)| (x + 10 * y + 100 * z) as f32)
    }

    #[test]
    fn test_grid_points_are_exact() {
        let data = ramp();
        assert_eq!(Interpolator::trilinear_interpolate(&data, 2.0, 1.0, 0.0), 210.0);
        assert_eq!(Interpolator::trilinear_interpolate(&data, 2.0, 2.0, 2.0), 222.0);
    }

    #[test]
    fn test_linear_field_is_reproduced() {
        let data = ramp();
        let value = Interpolator::trilinear_interpolate(&data, 0.25, 1.5, 0.5);
        assert!((value - (0.5 + 15.0 + 25.0)).abs() < 1e-4);
    }

    #[test]
    fn test_single_voxel_axis() {
        let data = Array3::from_elem((1, 2, 2), 7.0_f32);
        assert_eq!(Interpolator::trilinear_interpolate(&data, 0.0, 0.5, 0.5), 7.0);
    }
}
