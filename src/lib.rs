//! # DICOM-CPR library
//!
//! This crate computes curved planar reformations (CPR) and oriented axial
//! cross-sections of DICOM volumes along a centerline.
//!
//! Volumes are loaded from a directory of DICOM files or from in-memory
//! [`FileDicomObject<InMemDicomObject>`]s and sorted into a regular grid.
//! A centerline is fitted through seed points with a natural cubic spline
//! and resampled uniformly by arc length. Two reformation methods are
//! supported:
//!  - Stretched: the centerline is projected onto a plane and swept along
//!    one of the volume axes
//!  - Straight: the centerline is swept along a per-point direction field,
//!    triangulated and smoothed
//!
//! The swept surface is stacked into parallel slices, and one square plane
//! perpendicular to the centerline is built per segment. Every point is
//! sampled with trilinear interpolation in parallel using rayon. DICOM files
//! are assumed to have the following attributes:
//!   - Axial data set
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series (Series Instance UID) and acquisition
//!     (Acquisition Number)
//!
//! # Examples
//!
//! ## Reformation of a DICOM series
//!
//! Read a request, load the series it points to and compute the stretched
//! and axial pixel buffers.
//!
//! ```no_run
//! # use dicom_cpr::{compute_cmpr, ReformationRequest, SortBy, VolumeLoader};
//! let request: ReformationRequest =
//!     serde_json::from_str(&std::fs::read_to_string("request.json").unwrap()).unwrap();
//! let loader = VolumeLoader::new(SortBy::InstanceNumber);
//! let result = compute_cmpr(&request, &loader, None).expect("should have reformatted volume");
//! println!("{:?} {:?}", result.dimension_cmpr, result.wwwl_cmpr);
//! ```
//!
//! [`FileDicomObject<InMemDicomObject>`]: https://docs.rs/dicom-object/latest/dicom_object/struct.FileDicomObject.html

pub mod centerline;
pub mod enums;
pub mod error;
pub mod frames;
pub mod geometry;
mod interpolator;
pub mod reformation;
pub mod render;
pub mod sampler;
pub mod stack;
pub mod surface;
pub mod volume;
pub mod volume_loader;

pub use enums::{Axis, Method, SortBy};
pub use error::{CprError, InputError};
pub use reformation::{Reformation, ReformationRequest, ReformationResult, compute_cmpr};
pub use render::{PngPreviewSink, RenderScene, RenderSink};
pub use volume::Volume;
pub use volume_loader::{LoadVolume, VolumeLoader, VolumeLoaderError};
