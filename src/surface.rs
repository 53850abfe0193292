//! Sweep surfaces: a centerline extruded through a direction field into a
//! row/column grid, with optional triangulation and Laplacian smoothing.

use crate::centerline::Centerline;
use crate::error::InputError;
use crate::frames::DirectionField;
use crate::geometry::{Point3D, Vector3D};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Cells {
    Quads(Vec<[usize; 4]>),
    Triangles(Vec<[usize; 3]>),
}

/// Row-major point grid with mesh connectivity.
///
/// Point `(row, col)` lives at index `row * cols + col`.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    rows: usize,
    cols: usize,
    points: Vec<Point3D>,
    cells: Cells,
}

/// Column placement for a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepLayout {
    pub cols: usize,
    pub spacing: f64,
    /// Columns run from `-cols/2` instead of 0
    pub centered: bool,
}

impl SweepLayout {
    /// Columns start on the centerline and run `distance` along the field
    pub fn one_sided(distance: f64, cols: usize) -> Self {
        Self {
            cols,
            spacing: distance / cols as f64,
            centered: false,
        }
    }

    /// Columns span `width`, centered on the centerline
    pub fn centered(width: f64, cols: usize) -> Self {
        Self {
            cols,
            spacing: width / cols as f64,
            centered: true,
        }
    }

    /// Signed distance of column `col` from the centerline
    pub fn offset(&self, col: usize) -> f64 {
        let index = if self.centered {
            col as f64 - (self.cols / 2) as f64
        } else {
            col as f64
        };
        index * self.spacing
    }
}

/// Laplacian smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingOptions {
    pub iterations: usize,
    pub relaxation_factor: f64,
    /// Relax boundary vertices along the boundary
    pub boundary_smoothing: bool,
    /// Detect sharp interior edges and relax their vertices only along them
    pub feature_edge_smoothing: bool,
    /// Dihedral angle in degrees above which an interior edge is sharp
    pub feature_angle: f64,
    /// Boundary bend in degrees above which a boundary vertex is pinned
    pub edge_angle: f64,
    /// Stop when the largest move is below this fraction of the diagonal
    pub convergence: f64,
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            iterations: 1000,
            relaxation_factor: 0.1,
            boundary_smoothing: true,
            feature_edge_smoothing: false,
            feature_angle: 45.0,
            edge_angle: 15.0,
            convergence: 0.0,
        }
    }
}

impl Surface {
    pub fn from_grid(rows: usize, cols: usize, points: Vec<Point3D>) -> Self {
        debug_assert_eq!(points.len(), rows * cols);
        Self {
            rows,
            cols,
            points,
            cells: Cells::Quads(grid_quads(rows, cols)),
        }
    }

    /// Extrude `centerline` through `field`.
    ///
    /// Point `(r, c)` is `centerline[r] + field(r) * layout.offset(c)`.
    pub fn sweep(
        centerline: &Centerline,
        field: &DirectionField,
        layout: SweepLayout,
    ) -> Result<Self, InputError> {
        let rows = centerline.len();
        if let Some(found) = field.len().filter(|&found| found != rows) {
            return Err(InputError::DirectionFieldLength {
                expected: 3 * rows,
                found: 3 * found,
            });
        }

        let points = centerline
            .points()
            .iter()
            .enumerate()
            .flat_map(|(row, origin)| {
                let direction = field.at(row);
                (0..layout.cols).map(move |col| origin + direction * layout.offset(col))
            })
            .collect();
        log::debug!("Sweep surface {} x {}", rows, layout.cols);

        Ok(Self::from_grid(rows, layout.cols, points))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    pub fn point(&self, row: usize, col: usize) -> Point3D {
        self.points[row * self.cols + col]
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Copy of this surface moved by `offset`
    pub fn translate(&self, offset: &Vector3D) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            points: self.points.iter().map(|p| p + offset).collect(),
            cells: self.cells.clone(),
        }
    }

    /// Split every quad `(a, b, c, d)` into `(a, b, c)` and `(a, c, d)`
    pub fn triangulate(&self) -> Self {
        let cells = match &self.cells {
            Cells::Quads(quads) => Cells::Triangles(
                quads
                    .iter()
                    .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
                    .collect(),
            ),
            Cells::Triangles(triangles) => Cells::Triangles(triangles.clone()),
        };
        Self {
            rows: self.rows,
            cols: self.cols,
            points: self.points.clone(),
            cells,
        }
    }

    /// Iterative Laplacian relaxation, returns the relaxed surface
    pub fn smooth(&self, options: &SmoothingOptions) -> Self {
        let topology = Topology::build(self, options);
        let diagonal = self.bounding_diagonal();
        let threshold = options.convergence * diagonal;

        let mut current = self.points.clone();
        let mut performed = 0;
        for _ in 0..options.iterations {
            let next: Vec<Point3D> = current
                .par_iter()
                .enumerate()
                .map(|(i, point)| {
                    let neighbours = &topology.smoothing_neighbours[i];
                    if neighbours.is_empty() {
                        return *point;
                    }
                    let mean = neighbours
                        .iter()
                        .fold(Vector3D::zeros(), |acc, &n| acc + current[n].coords)
                        / neighbours.len() as f64;
                    point + (mean - point.coords) * options.relaxation_factor
                })
                .collect();

            let max_move = next
                .par_iter()
                .zip(current.par_iter())
                .map(|(a, b)| (a - b).norm())
                .reduce(|| 0.0, f64::max);
            current = next;
            performed += 1;
            if max_move <= threshold {
                break;
            }
        }
        log::debug!(
            "Smoothed {} points in {} iterations ({} pinned)",
            current.len(),
            performed,
            topology.pinned
        );

        Self {
            rows: self.rows,
            cols: self.cols,
            points: current,
            cells: self.cells.clone(),
        }
    }

    fn bounding_diagonal(&self) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        let (lo, hi) = self
            .points
            .iter()
            .fold((first.coords, first.coords), |(lo, hi), p| {
                (lo.inf(&p.coords), hi.sup(&p.coords))
            });
        (hi - lo).norm()
    }

    fn cell_indices(&self) -> Vec<Vec<usize>> {
        match &self.cells {
            Cells::Quads(quads) => quads.iter().map(|q| q.to_vec()).collect(),
            Cells::Triangles(triangles) => triangles.iter().map(|t| t.to_vec()).collect(),
        }
    }
}

fn grid_quads(rows: usize, cols: usize) -> Vec<[usize; 4]> {
    let mut quads = Vec::with_capacity(rows.saturating_sub(1) * cols.saturating_sub(1));
    for row in 0..rows.saturating_sub(1) {
        for col in 0..cols.saturating_sub(1) {
            let p0 = col + row * cols;
            quads.push([p0, p0 + 1, p0 + cols + 1, p0 + cols]);
        }
    }
    quads
}

/// Per-vertex neighbour lists used by the smoother
struct Topology {
    smoothing_neighbours: Vec<Vec<usize>>,
    pinned: usize,
}

impl Topology {
    fn build(surface: &Surface, options: &SmoothingOptions) -> Self {
        let n = surface.points.len();
        let cells = surface.cell_indices();

        // edge -> incident cells
        let mut edge_cells: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (cell_id, cell) in cells.iter().enumerate() {
            for k in 0..cell.len() {
                let (a, b) = (cell[k], cell[(k + 1) % cell.len()]);
                edge_cells.entry((a.min(b), a.max(b))).or_default().push(cell_id);
            }
        }

        let normals: Vec<Vector3D> = cells
            .iter()
            .map(|cell| cell_normal(&surface.points, cell))
            .collect();
        let cos_feature = options.feature_angle.to_radians().cos();

        let mut all: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut special: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut on_boundary = vec![false; n];
        for (&(a, b), incident) in &edge_cells {
            all[a].insert(b);
            all[b].insert(a);
            let boundary = incident.len() == 1;
            let feature = options.feature_edge_smoothing
                && incident.len() == 2
                && normals[incident[0]].dot(&normals[incident[1]]) < cos_feature;
            if boundary {
                on_boundary[a] = true;
                on_boundary[b] = true;
            }
            if boundary || feature {
                special[a].insert(b);
                special[b].insert(a);
            }
        }

        let cos_edge = options.edge_angle.to_radians().cos();
        let mut pinned = 0;
        let smoothing_neighbours = (0..n)
            .map(|i| {
                let edges: Vec<usize> = special[i].iter().copied().collect();
                match edges.as_slice() {
                    [] => all[i].iter().copied().collect(),
                    _ if on_boundary[i] && !options.boundary_smoothing => {
                        pinned += 1;
                        Vec::new()
                    }
                    [a, b] => {
                        let p = surface.points[i];
                        let ea = surface.points[*a] - p;
                        let eb = p - surface.points[*b];
                        let straight = match (ea.try_normalize(0.0), eb.try_normalize(0.0)) {
                            (Some(ea), Some(eb)) => ea.dot(&eb) >= cos_edge,
                            _ => false,
                        };
                        if straight {
                            vec![*a, *b]
                        } else {
                            pinned += 1;
                            Vec::new()
                        }
                    }
                    _ => {
                        pinned += 1;
                        Vec::new()
                    }
                }
            })
            .collect();

        Self {
            smoothing_neighbours,
            pinned,
        }
    }
}

fn cell_normal(points: &[Point3D], cell: &[usize]) -> Vector3D {
    let p0 = points[cell[0]];
    let mut normal = Vector3D::zeros();
    for k in 1..cell.len() - 1 {
        normal += (points[cell[k]] - p0).cross(&(points[cell[k + 1]] - p0));
    }
    normal.try_normalize(0.0).unwrap_or_else(Vector3D::zeros)
}
