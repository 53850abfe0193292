use crate::volume_loader::VolumeLoaderError;
use thiserror::Error;

/// Problems with the caller-supplied request or the geometry derived from it.
///
/// All of these are raised before the volume is sampled.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Seed list length {0} is not a multiple of 3")]
    MalformedSeeds(usize),

    #[error("At least 2 points are required, found {0}")]
    TooFewPoints(usize),

    #[error("Non-finite coordinate at point {0}")]
    NonFiniteCoordinate(usize),

    #[error("Resolution must be at least 2, got {0}")]
    InvalidResolution(u32),

    #[error("Sweep direction {0:?} does not select exactly one axis")]
    InvalidSweepAxis([i32; 3]),

    #[error("Direction field has {found} values, expected {expected}")]
    DirectionFieldLength { expected: usize, found: usize },

    #[error("Direction field vector {0} has zero length")]
    ZeroDirection(usize),

    #[error("Straight reformation requires a per-point direction field (tng or ptn)")]
    MissingDirectionField,

    #[error("Straight reformation requires a positive slice dimension")]
    InvalidSliceDimension,

    #[error("Stack direction must be a finite 3-vector")]
    InvalidStackDirection,

    #[error("Number of slices must be at least 1, got {0}")]
    InvalidSliceCount(i64),

    #[error("Distance between slices must be finite and non-negative, got {0}")]
    InvalidSliceDistance(f32),

    #[error("Axial plane side length must be positive, got {0}")]
    InvalidSideLength(f32),

    #[error("Centerline collapses to fewer than 2 distinct points")]
    DegenerateCenterline,
}

/// Failure of a reformation request
#[derive(Debug, Error)]
pub enum CprError {
    #[error("Volume could not be loaded: {0}")]
    Resource(#[from] VolumeLoaderError),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
}
