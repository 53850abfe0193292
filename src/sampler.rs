use crate::geometry::Point3D;
use crate::volume::{OUT_OF_BOUNDS_VALUE, Volume};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sampled scalars, one per input point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelBuffer {
    values: Vec<f32>,
}

/// Linear contrast mapping: intensity range and its midpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLevel {
    pub window: f32,
    pub level: f32,
}

impl PixelBuffer {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(min, max)` of the buffer, `None` when empty
    pub fn range(&self) -> Option<(f32, f32)> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.par_iter().fold(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |(lo, hi), &v| (lo.min(v), hi.max(v)),
        ).reduce(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.max(b.1)),
        ))
    }

    /// Window is the buffer's own range, level half of it
    pub fn window_level(&self) -> WindowLevel {
        let window = self.range().map_or(0.0, |(lo, hi)| hi - lo);
        WindowLevel {
            window,
            level: window / 2.0,
        }
    }
}

impl From<Vec<f32>> for PixelBuffer {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

pub struct VolumeSampler;

impl VolumeSampler {
    /// Sample `volume` at every point.
    ///
    /// Values are in point order, or from the last point down to the first
    /// when `reverse` is set. Nothing is skipped or deduplicated.
    pub fn sample(volume: &Volume, points: &[Point3D], reverse: bool) -> PixelBuffer {
        let samples: Vec<Option<f32>> = points.par_iter().map(|p| volume.try_sample(p)).collect();
        let outside = samples.iter().filter(|s| s.is_none()).count();
        let mut values: Vec<f32> = samples
            .into_iter()
            .map(|s| s.unwrap_or(OUT_OF_BOUNDS_VALUE))
            .collect();
        if reverse {
            values.reverse();
        }
        if outside > 0 {
            log::debug!("{outside} of {} sample points fell outside the volume", points.len());
        }
        PixelBuffer { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp_volume() -> Volume {
        let data = Array3::from_shape_fn((4, 4, 4), |(_, _, x)| x as f32 * 10.0);
        Volume::new(data, [0.0; 3], [1.0; 3]).unwrap()
    }

    #[test]
    fn test_zero_volume_gives_zero_buffer() {
        let volume = Volume::new(Array3::zeros((5, 5, 5)), [0.0; 3], [1.0; 3]).unwrap();
        let points: Vec<Point3D> = (0..37)
            .map(|i| Point3D::new((i % 5) as f64 * 0.9, (i % 3) as f64 * 1.7, (i % 4) as f64))
            .collect();
        let buffer = VolumeSampler::sample(&volume, &points, false);

        assert_eq!(buffer.len(), points.len());
        assert!(buffer.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_order_and_reverse() {
        let volume = ramp_volume();
        let points: Vec<Point3D> = (0..4).map(|x| Point3D::new(x as f64, 1.0, 1.0)).collect();

        let forward = VolumeSampler::sample(&volume, &points, false);
        let backward = VolumeSampler::sample(&volume, &points, true);
        assert_eq!(forward.values(), &[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(backward.values(), &[30.0, 20.0, 10.0, 0.0]);
    }

    #[test]
    fn test_out_of_bounds_points_are_kept() {
        let volume = ramp_volume();
        let points = [
            Point3D::new(1.5, 0.0, 0.0),
            Point3D::new(-3.0, 0.0, 0.0),
            Point3D::new(1.5, 0.0, 0.0),
        ];
        let buffer = VolumeSampler::sample(&volume, &points, false);
        assert_eq!(buffer.values(), &[15.0, OUT_OF_BOUNDS_VALUE, 15.0]);
    }

    #[test]
    fn test_window_level() {
        let buffer = PixelBuffer::from(vec![50.0, 10.0, 210.0, 100.0]);
        assert_eq!(buffer.range(), Some((10.0, 210.0)));
        assert_eq!(
            buffer.window_level(),
            WindowLevel {
                window: 200.0,
                level: 100.0
            }
        );
        assert_eq!(PixelBuffer::default().window_level().window, 0.0);
    }
}
