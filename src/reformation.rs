//! Reformation pipeline: centerline, direction field, sweep surface, slice
//! and axial stacks, volume sampling and the response payload.

use crate::centerline::{Centerline, CenterlineBuilder, parse_seeds};
use crate::enums::{Axis, Method};
use crate::error::{CprError, InputError};
use crate::frames::{DirectionField, sweep_distance};
use crate::geometry::{Plane, Point3D, Vector3D};
use crate::render::{RenderScene, RenderSink};
use crate::sampler::VolumeSampler;
use crate::stack::{AxialStack, SliceStack};
use crate::surface::{SmoothingOptions, Surface, SweepLayout};
use crate::volume::Volume;
use crate::volume_loader::LoadVolume;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use web_time::Instant;

/// Side length of the axial cross-section planes, in world units
pub const DEFAULT_AXIAL_SIDE_LENGTH: f32 = 120.0;

fn default_axial_side_length() -> f32 {
    DEFAULT_AXIAL_SIDE_LENGTH
}

/// Reformation request as read from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReformationRequest {
    pub method: Method,
    /// Handle resolved by the volume loader
    #[serde(default)]
    pub volume_file_path: PathBuf,
    /// Flat `x, y, z` list
    pub seeds: Vec<f32>,
    pub resolution: u32,
    /// One-hot sweep axis, stretched only
    #[serde(default)]
    pub sweep_dir: [i32; 3],
    pub stack_direction: [f32; 3],
    pub dist_slices: f32,
    pub n_slices: i64,
    #[serde(default)]
    pub render: bool,
    /// Per-point tangents, straight only
    #[serde(default)]
    pub tng: Option<Vec<f32>>,
    /// Per-point sweep directions, straight only
    #[serde(default)]
    pub ptn: Option<Vec<f32>>,
    /// Sweep width, straight only
    #[serde(default)]
    pub slice_dimension: Option<f32>,
    #[serde(default = "default_axial_side_length")]
    pub axial_side_length: f32,
    #[serde(default)]
    pub smoothing: SmoothingOptions,
}

impl ReformationRequest {
    /// Check everything that does not need the volume
    pub fn validate(&self) -> Result<(), InputError> {
        if self.resolution < 2 {
            return Err(InputError::InvalidResolution(self.resolution));
        }
        parse_seeds(&self.seeds)?;
        if self.n_slices < 1 {
            return Err(InputError::InvalidSliceCount(self.n_slices));
        }
        if !self.dist_slices.is_finite() || self.dist_slices < 0.0 {
            return Err(InputError::InvalidSliceDistance(self.dist_slices));
        }
        if !self.stack_direction.iter().all(|v| v.is_finite()) {
            return Err(InputError::InvalidStackDirection);
        }
        if !self.axial_side_length.is_finite() || self.axial_side_length <= 0.0 {
            return Err(InputError::InvalidSideLength(self.axial_side_length));
        }

        match self.method {
            Method::Stretched => {
                Axis::from_one_hot(self.sweep_dir)?;
            }
            Method::Straight => {
                let field = self.direction_field().ok_or(InputError::MissingDirectionField)?;
                let expected = 3 * self.resolution as usize;
                if field.len() != expected {
                    return Err(InputError::DirectionFieldLength {
                        expected,
                        found: field.len(),
                    });
                }
                self.slice_width()?;
            }
        }
        Ok(())
    }

    /// Straight-mode sweep directions: `ptn`, falling back to `tng`
    fn direction_field(&self) -> Option<&[f32]> {
        self.ptn.as_deref().or(self.tng.as_deref())
    }

    fn slice_width(&self) -> Result<f64, InputError> {
        match self.slice_dimension {
            Some(width) if width.is_finite() && width > 0.0 => Ok(width as f64),
            _ => Err(InputError::InvalidSliceDimension),
        }
    }

    fn stack_direction_checked(&self) -> Result<Vector3D, InputError> {
        let [x, y, z] = self.stack_direction;
        let direction = Vector3D::new(x as f64, y as f64, z as f64);
        if direction.iter().all(|v| v.is_finite()) {
            Ok(direction)
        } else {
            Err(InputError::InvalidStackDirection)
        }
    }
}

/// Reformation output; every numeric field is single precision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReformationResult {
    /// origin×3, dims×3, bounds×6
    pub metadata: Vec<f32>,
    pub pixels_cmpr: Vec<f32>,
    pub pixels_axial: Vec<f32>,
    /// rows (centerline points), columns, slices
    pub dimension_cmpr: [f32; 3],
    /// plane rows, plane columns, frames
    pub dimension_axial: [f32; 3],
    pub spacing_cmpr: [f32; 2],
    pub spacing_axial: [f32; 2],
    /// window, level
    pub wwwl_cmpr: [f32; 2],
    pub wwwl_axial: [f32; 2],
    pub iop_axial: Vec<f32>,
    pub ipp_axial: Vec<f32>,
}

impl ReformationResult {
    /// Response payload keyed by field name
    pub fn to_payload(&self) -> BTreeMap<String, Vec<f32>> {
        BTreeMap::from([
            ("metadata".to_string(), self.metadata.clone()),
            ("pixels_cmpr".to_string(), self.pixels_cmpr.clone()),
            ("pixels_axial".to_string(), self.pixels_axial.clone()),
            ("dimension_cmpr".to_string(), self.dimension_cmpr.to_vec()),
            ("dimension_axial".to_string(), self.dimension_axial.to_vec()),
            ("spacing_cmpr".to_string(), self.spacing_cmpr.to_vec()),
            ("spacing_axial".to_string(), self.spacing_axial.to_vec()),
            ("wwwl_cmpr".to_string(), self.wwwl_cmpr.to_vec()),
            ("wwwl_axial".to_string(), self.wwwl_axial.to_vec()),
            ("iop_axial".to_string(), self.iop_axial.clone()),
            ("ipp_axial".to_string(), self.ipp_axial.clone()),
        ])
    }
}

/// Sweep surface and the centerline it was swept from
struct SweepOutput {
    centerline: Centerline,
    surface: Surface,
    distance: f64,
}

/// Pipeline products kept for the visualization sink
struct Reformed {
    result: ReformationResult,
    original: Centerline,
    stack: SliceStack,
}

/// Runs reformations against one loaded volume
pub struct Reformation<'a> {
    volume: &'a Volume,
}

impl<'a> Reformation<'a> {
    pub fn new(volume: &'a Volume) -> Self {
        Self { volume }
    }

    pub fn run(&self, request: &ReformationRequest) -> Result<ReformationResult, InputError> {
        self.execute(request).map(|reformed| reformed.result)
    }

    fn execute(&self, request: &ReformationRequest) -> Result<Reformed, InputError> {
        let start = Instant::now();
        request.validate()?;
        log::info!(
            "Reformation {:?}: {} seeds, resolution {}, {} slices",
            request.method,
            request.seeds.len() / 3,
            request.resolution,
            request.n_slices
        );

        let metadata = self.volume.metadata();
        let resolution = request.resolution as usize;
        let seeds = parse_seeds(&request.seeds)?;
        let original = CenterlineBuilder::new(resolution).build(&seeds)?;

        let sweep = match request.method {
            Method::Stretched => self.stretched_sweep(request, &seeds, resolution)?,
            Method::Straight => Self::straight_sweep(request, &original, resolution)?,
        };
        log::debug!("Sweep surface built in {:?}", start.elapsed());

        let stack = SliceStack::create(
            sweep.surface,
            request.n_slices as usize,
            request.stack_direction_checked()?,
            request.dist_slices as f64,
        )?;
        let axial = AxialStack::create(&original, request.axial_side_length as f64, resolution)?;
        log::debug!(
            "Stacks built in {:?}: {} slices, {} axial frames",
            start.elapsed(),
            stack.len(),
            axial.len()
        );

        let pixels_cmpr = VolumeSampler::sample(self.volume, &stack.squash(false), false);
        let pixels_axial = VolumeSampler::sample(self.volume, &axial.squash(false), true);
        log::debug!(
            "Sampled {} + {} points in {:?}",
            pixels_cmpr.len(),
            pixels_axial.len(),
            start.elapsed()
        );

        let base = &stack.slices()[0];
        let axial_spacing = axial.pixel_spacing() as f32;
        let wwwl_cmpr = pixels_cmpr.window_level();
        let wwwl_axial = pixels_axial.window_level();
        let result = ReformationResult {
            metadata: metadata.to_vec(),
            dimension_cmpr: [base.rows() as f32, base.cols() as f32, stack.len() as f32],
            dimension_axial: [resolution as f32, resolution as f32, axial.len() as f32],
            spacing_cmpr: [
                (sweep.distance / resolution as f64) as f32,
                sweep.centerline.mean_segment_length() as f32,
            ],
            spacing_axial: [axial_spacing, axial_spacing],
            wwwl_cmpr: [wwwl_cmpr.window, wwwl_cmpr.level],
            wwwl_axial: [wwwl_axial.window, wwwl_axial.level],
            iop_axial: axial.iop(),
            ipp_axial: axial.ipp(),
            pixels_cmpr: pixels_cmpr.into_values(),
            pixels_axial: pixels_axial.into_values(),
        };
        log::info!("Reformation finished in {:?}", start.elapsed());

        Ok(Reformed {
            result,
            original,
            stack,
        })
    }

    /// Seeds projected onto the volume boundary facing the sweep, then swept
    /// across the whole volume extent along the fixed axis
    fn stretched_sweep(
        &self,
        request: &ReformationRequest,
        seeds: &[Point3D],
        resolution: usize,
    ) -> Result<SweepOutput, InputError> {
        let axis = Axis::from_one_hot(request.sweep_dir)?;
        let [ox, oy, oz] = self.volume.origin();
        let boundary = Plane::new(Point3D::new(ox, oy, oz), -axis.unit())
            .ok_or(InputError::InvalidSweepAxis(request.sweep_dir))?;
        let projected = CenterlineBuilder::new(resolution)
            .with_projection(boundary)
            .build(seeds)?;

        let distance = sweep_distance(self.volume, axis);
        log::debug!("Stretched sweep along {axis:?}, distance {distance}");
        let surface = Surface::sweep(
            &projected,
            &DirectionField::fixed(axis),
            SweepLayout::one_sided(distance, resolution),
        )?;

        Ok(SweepOutput {
            centerline: projected,
            surface,
            distance,
        })
    }

    /// Original centerline swept through the caller's direction field,
    /// centered, then triangulated and relaxed to undo folding
    fn straight_sweep(
        request: &ReformationRequest,
        original: &Centerline,
        resolution: usize,
    ) -> Result<SweepOutput, InputError> {
        let flat = request
            .direction_field()
            .ok_or(InputError::MissingDirectionField)?;
        let field = DirectionField::per_point(flat, original.len())?;
        let width = request.slice_width()?;

        let surface = Surface::sweep(original, &field, SweepLayout::centered(width, resolution))?
            .triangulate()
            .smooth(&request.smoothing);

        Ok(SweepOutput {
            centerline: original.clone(),
            surface,
            distance: width,
        })
    }
}

/// Load the request's volume, run the reformation and hand the products to
/// `sink` when rendering was requested.
///
/// Sink failures are logged and never change the returned result.
pub fn compute_cmpr(
    request: &ReformationRequest,
    loader: &dyn LoadVolume,
    sink: Option<&dyn RenderSink>,
) -> Result<ReformationResult, CprError> {
    let volume = loader.load(&request.volume_file_path)?;
    let reformed = Reformation::new(&volume).execute(request)?;

    if request.render {
        match sink {
            Some(sink) => {
                let scene = RenderScene {
                    centerline: &reformed.original,
                    surfaces: reformed.stack.slices(),
                    result: &reformed.result,
                    volume: &volume,
                };
                if let Err(err) = sink.render(&scene) {
                    log::warn!("Rendering failed: {err}");
                }
            }
            None => log::debug!("Render requested but no sink configured"),
        }
    }

    Ok(reformed.result)
}
