//! Centerline construction: seed parsing, optional projection onto a plane,
//! spline fitting and uniform arc-length resampling.

use crate::error::InputError;
use crate::geometry::{EPSILON, Plane, Point3D, Vector3D};

/// Spline evaluations per control span used to measure arc length
const SAMPLES_PER_SPAN: usize = 32;

/// Ordered 3D polyline with at least two points
#[derive(Debug, Clone, PartialEq)]
pub struct Centerline {
    points: Vec<Point3D>,
}

impl Centerline {
    pub fn from_points(points: Vec<Point3D>) -> Result<Self, InputError> {
        if points.len() < 2 {
            return Err(InputError::TooFewPoints(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Point3D {
        self.points[0]
    }

    pub fn last(&self) -> Point3D {
        self.points[self.points.len() - 1]
    }

    /// Total polyline length
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Mean distance between consecutive points
    pub fn mean_segment_length(&self) -> f64 {
        self.length() / (self.points.len() - 1) as f64
    }
}

/// Parse a flat `x, y, z, x, y, z, ...` list into points
pub fn parse_seeds(flat: &[f32]) -> Result<Vec<Point3D>, InputError> {
    if flat.len() % 3 != 0 {
        return Err(InputError::MalformedSeeds(flat.len()));
    }
    let points: Vec<Point3D> = flat
        .chunks_exact(3)
        .map(|c| Point3D::new(c[0] as f64, c[1] as f64, c[2] as f64))
        .collect();
    if points.len() < 2 {
        return Err(InputError::TooFewPoints(points.len()));
    }
    if let Some(index) = points.iter().position(|p| !p.coords.iter().all(|v| v.is_finite())) {
        return Err(InputError::NonFiniteCoordinate(index));
    }
    Ok(points)
}

/// Builds a resampled centerline from control points
#[derive(Debug, Clone, Copy)]
pub struct CenterlineBuilder {
    resolution: usize,
    projection: Option<Plane>,
}

impl CenterlineBuilder {
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution,
            projection: None,
        }
    }

    /// Project every control point onto `plane` before fitting
    pub fn with_projection(mut self, plane: Plane) -> Self {
        self.projection = Some(plane);
        self
    }

    /// Fit a spline through `seeds` and resample it to exactly `resolution`
    /// points, uniformly spaced by arc length.
    ///
    /// The first and last output points are the first and last (projected)
    /// control points.
    pub fn build(&self, seeds: &[Point3D]) -> Result<Centerline, InputError> {
        if self.resolution < 2 {
            return Err(InputError::InvalidResolution(self.resolution as u32));
        }
        if seeds.len() < 2 {
            return Err(InputError::TooFewPoints(seeds.len()));
        }

        let mut controls: Vec<Point3D> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let point = match &self.projection {
                Some(plane) => plane.project(seed),
                None => *seed,
            };
            // repeated control points have no chord length to parametrize
            if controls.last().is_none_or(|last| (point - last).norm() > EPSILON) {
                controls.push(point);
            }
        }
        if controls.len() < 2 {
            return Err(InputError::DegenerateCenterline);
        }

        let spline = NaturalSpline::fit(&controls);
        let dense = spline.tabulate(SAMPLES_PER_SPAN);
        let points = resample_by_arc_length(&dense, self.resolution);
        log::debug!(
            "Centerline: {} control points -> {} samples (projected: {})",
            controls.len(),
            points.len(),
            self.projection.is_some()
        );

        Centerline::from_points(points)
    }
}

/// Natural cubic spline through 3D points, parametrized by chord length
struct NaturalSpline {
    knots: Vec<f64>,
    points: Vec<Point3D>,
    second_derivatives: Vec<Vector3D>,
}

impl NaturalSpline {
    fn fit(points: &[Point3D]) -> Self {
        let n = points.len();
        let mut knots = Vec::with_capacity(n);
        knots.push(0.0);
        for w in points.windows(2) {
            let last = knots[knots.len() - 1];
            knots.push(last + (w[1] - w[0]).norm());
        }

        let mut second_derivatives = vec![Vector3D::zeros(); n];
        if n > 2 {
            // Thomas algorithm on the interior equations, natural end conditions
            let m = n - 2;
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![Vector3D::zeros(); m];
            for i in 1..n - 1 {
                let h0 = knots[i] - knots[i - 1];
                let h1 = knots[i + 1] - knots[i];
                let slope0 = (points[i] - points[i - 1]) / h0;
                let slope1 = (points[i + 1] - points[i]) / h1;
                diag[i - 1] = 2.0 * (h0 + h1);
                upper[i - 1] = h1;
                rhs[i - 1] = (slope1 - slope0) * 6.0;
            }
            for k in 1..m {
                let lower = knots[k + 1] - knots[k];
                let factor = lower / diag[k - 1];
                diag[k] -= factor * upper[k - 1];
                let prev = rhs[k - 1];
                rhs[k] -= prev * factor;
            }
            second_derivatives[m] = rhs[m - 1] / diag[m - 1];
            for k in (0..m - 1).rev() {
                second_derivatives[k + 1] = (rhs[k] - second_derivatives[k + 2] * upper[k]) / diag[k];
            }
        }

        Self {
            knots,
            points: points.to_vec(),
            second_derivatives,
        }
    }

    fn evaluate_span(&self, span: usize, t: f64) -> Point3D {
        let h = self.knots[span + 1] - self.knots[span];
        let a = (self.knots[span + 1] - t) / h;
        let b = (t - self.knots[span]) / h;
        let linear = self.points[span].coords * a + self.points[span + 1].coords * b;
        let curvature = (self.second_derivatives[span] * (a * a * a - a)
            + self.second_derivatives[span + 1] * (b * b * b - b))
            * (h * h / 6.0);
        Point3D::from(linear + curvature)
    }

    /// Dense polyline through the spline, control points included exactly
    fn tabulate(&self, samples_per_span: usize) -> Vec<Point3D> {
        let spans = self.points.len() - 1;
        let mut dense = Vec::with_capacity(spans * samples_per_span + 1);
        for span in 0..spans {
            dense.push(self.points[span]);
            let (t0, t1) = (self.knots[span], self.knots[span + 1]);
            for k in 1..samples_per_span {
                let t = t0 + (t1 - t0) * k as f64 / samples_per_span as f64;
                dense.push(self.evaluate_span(span, t));
            }
        }
        dense.push(self.points[spans]);
        dense
    }
}

/// `count` points evenly spaced along the arc length of `polyline`
fn resample_by_arc_length(polyline: &[Point3D], count: usize) -> Vec<Point3D> {
    let mut cumulative = Vec::with_capacity(polyline.len());
    cumulative.push(0.0);
    for w in polyline.windows(2) {
        let last = cumulative[cumulative.len() - 1];
        cumulative.push(last + (w[1] - w[0]).norm());
    }
    let total = cumulative[cumulative.len() - 1];

    let mut resampled = Vec::with_capacity(count);
    let mut segment = 0;
    for j in 0..count {
        let target = total * j as f64 / (count - 1) as f64;
        while segment + 2 < polyline.len() && cumulative[segment + 1] < target {
            segment += 1;
        }
        let span = cumulative[segment + 1] - cumulative[segment];
        let t = if span > 0.0 {
            ((target - cumulative[segment]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let a = polyline[segment];
        let b = polyline[segment + 1];
        resampled.push(a + (b - a) * t);
    }

    resampled[0] = polyline[0];
    resampled[count - 1] = polyline[polyline.len() - 1];
    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> Vec<Point3D> {
        vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(10.0, 5.0, 2.0),
            Point3D::new(20.0, 0.0, 4.0),
            Point3D::new(30.0, -5.0, 1.0),
        ]
    }

    #[test]
    fn test_parse_seeds() {
        let points = parse_seeds(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(points, vec![Point3D::new(0.0, 1.0, 2.0), Point3D::new(3.0, 4.0, 5.0)]);

        assert_eq!(parse_seeds(&[0.0, 1.0]), Err(InputError::MalformedSeeds(2)));
        assert_eq!(parse_seeds(&[0.0, 1.0, 2.0]), Err(InputError::TooFewPoints(1)));
        assert_eq!(
            parse_seeds(&[0.0, 1.0, 2.0, f32::NAN, 0.0, 0.0]),
            Err(InputError::NonFiniteCoordinate(1))
        );
    }

    #[test]
    fn test_resolution_and_endpoints() {
        let seeds = seeds();
        for resolution in [2, 3, 10, 257] {
            let centerline = CenterlineBuilder::new(resolution).build(&seeds).unwrap();
            assert_eq!(centerline.len(), resolution);
            assert!((centerline.first() - seeds[0]).norm() < 1e-12);
            assert!((centerline.last() - seeds[3]).norm() < 1e-12);
        }
    }

    #[test]
    fn test_uniform_arc_length() {
        let centerline = CenterlineBuilder::new(50).build(&seeds()).unwrap();
        let mean = centerline.mean_segment_length();
        for w in centerline.points().windows(2) {
            let d = (w[1] - w[0]).norm();
            assert!((d - mean).abs() / mean < 0.02, "segment {d} vs mean {mean}");
        }
    }

    #[test]
    fn test_spline_passes_through_controls() {
        let seeds = seeds();
        let spline = NaturalSpline::fit(&seeds);
        let dense = spline.tabulate(8);
        for (i, seed) in seeds.iter().enumerate() {
            assert!((dense[i * 8] - seed).norm() < 1e-12);
        }
        // interior evaluation at a knot matches the control point too
        let at_knot = spline.evaluate_span(1, spline.knots[2]);
        assert!((at_knot - seeds[2]).norm() < 1e-9);
    }

    #[test]
    fn test_two_points_is_straight() {
        let seeds = [Point3D::new(0.0, 0.0, 0.0), Point3D::new(9.0, 0.0, 0.0)];
        let centerline = CenterlineBuilder::new(10).build(&seeds).unwrap();
        for (i, p) in centerline.points().iter().enumerate() {
            assert!((p - Point3D::new(i as f64, 0.0, 0.0)).norm() < 1e-9);
        }
        assert!((centerline.mean_segment_length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection() {
        let plane = Plane::new(Point3D::new(0.0, -3.0, 0.0), Vector3D::new(0.0, -1.0, 0.0)).unwrap();
        let centerline = CenterlineBuilder::new(20)
            .with_projection(plane)
            .build(&seeds())
            .unwrap();

        assert!(centerline.points().iter().all(|p| (p.y + 3.0).abs() < 1e-9));
        assert!((centerline.first() - Point3D::new(0.0, -3.0, 0.0)).norm() < 1e-12);
        assert!((centerline.last() - Point3D::new(30.0, -3.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_degenerate_seeds() {
        let same = [Point3D::new(1.0, 1.0, 1.0); 3];
        assert_eq!(
            CenterlineBuilder::new(5).build(&same),
            Err(InputError::DegenerateCenterline)
        );

        // collapses after projection along the line direction
        let plane = Plane::new(Point3D::origin(), Vector3D::x()).unwrap();
        let seeds = [Point3D::new(0.0, 1.0, 1.0), Point3D::new(5.0, 1.0, 1.0)];
        assert_eq!(
            CenterlineBuilder::new(5).with_projection(plane).build(&seeds),
            Err(InputError::DegenerateCenterline)
        );
        assert_eq!(
            CenterlineBuilder::new(1).build(&seeds),
            Err(InputError::InvalidResolution(1))
        );
    }
}
