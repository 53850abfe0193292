use crate::{enums::SortBy, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Invalid volume geometry (origin or spacing)")]
    InvalidGeometry,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Resolves an opaque volume handle into a loaded [`Volume`]
pub trait LoadVolume {
    fn load(&self, path: &Path) -> Result<Volume, VolumeLoaderError>;
}

struct SliceImage {
    order: Option<f32>,
    position: Option<[f64; 3]>,
    pixels: Array2<f32>,
}

/// DICOM series loader.
///
/// As a [`LoadVolume`] it reads a directory as one series and a single file
/// as a one-slice volume.
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeLoader {
    pub sort_by: SortBy,
}

impl LoadVolume for VolumeLoader {
    fn load(&self, path: &Path) -> Result<Volume, VolumeLoaderError> {
        log::info!("Loading volume from {}", path.display());
        if path.is_dir() {
            Self::load_from_directory(path, self.sort_by)
        } else {
            Self::load_from_file_paths(&[path], self.sort_by)
        }
    }
}

impl VolumeLoader {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found, dimensions are inconsistent or
    /// no pixel spacing is present
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut images: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image(dicom_object, &sort_by))
            .collect();

        if images.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        log::debug!(
            "Decoded {} of {} DICOM objects",
            images.len(),
            dicom_objects.len()
        );

        Self::sort_images(&mut images, sort_by);
        Self::validate_dimensions(&images)?;

        let pixel_spacing =
            Self::get_pixel_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        Self::assemble(images, pixel_spacing, Self::get_slice_thickness(dicom_objects))
    }

    /// Stack sorted slices into a volume whose z grows with the slice index
    fn assemble(
        mut images: Vec<SliceImage>,
        (row_spacing, column_spacing): (f64, f64),
        thickness: Option<f64>,
    ) -> Result<Volume, VolumeLoaderError> {
        if Self::is_descending(&images) {
            log::debug!("Slices run towards decreasing z, reversing");
            images.reverse();
        }

        let positions: Vec<_> = images.iter().map(|image| image.position).collect();
        let slice_spacing = Self::slice_spacing(&positions, thickness);
        let origin = images[0].position.unwrap_or([0.0; 3]);

        let volume_array = Self::build_volume_array(&images);
        log::info!(
            "Volume {:?} (depth, height, width), spacing ({}, {}, {})",
            volume_array.dim(),
            column_spacing,
            row_spacing,
            slice_spacing
        );

        Volume::new(volume_array, origin, [column_spacing, row_spacing, slice_spacing])
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_image(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<SliceImage> {
        let position = Self::get_position(dicom_object);
        let order = Self::get_sort_order(dicom_object, sort_by, position)?;
        let pixels = Self::decode_image(dicom_object)?;
        Some(SliceImage {
            order,
            position,
            pixels,
        })
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<[f64; 3]> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        match pos.as_slice() {
            [x, y, z, ..] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
        position: Option<[f64; 3]>,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => Some(Some(position?[2] as f32)),
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// First frame, modality LUT applied, no windowing
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::Default)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images: &mut [SliceImage], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    fn validate_dimensions(images: &[SliceImage]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].pixels.dim();
        if images.iter().any(|img| img.pixels.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[SliceImage]) -> Array3<f32> {
        let (height, width) = images[0].pixels.dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&image.pixels);
        }

        volume
    }

    /// Pixel spacing as (row spacing, column spacing)
    fn get_pixel_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f64, f64)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;
            match pixel_spacing.as_slice() {
                [row, column, ..] => Some((*row, *column)),
                _ => None,
            }
        })
    }

    fn get_slice_thickness(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<f64> {
        dicom_objects.iter().find_map(|dicom_object| {
            dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float64()
                .ok()
        })
    }

    /// Signed z step between the first and last positioned slices is negative
    fn is_descending(images: &[SliceImage]) -> bool {
        let mut positions = images.iter().filter_map(|image| image.position);
        match (positions.next(), positions.last()) {
            (Some(first), Some(last)) => last[2] < first[2],
            _ => false,
        }
    }

    /// Distance between the first two slice positions, then slice thickness,
    /// then 1.0
    fn slice_spacing(positions: &[Option<[f64; 3]>], thickness: Option<f64>) -> f64 {
        let from_positions = match positions {
            [Some(a), Some(b), ..] => {
                let d = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt();
                (d > 0.0).then_some(d)
            }
            _ => None,
        };
        from_positions
            .or(thickness.filter(|t| t.is_finite() && *t > 0.0))
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3D;

    fn slice(order: f32, z: f64, value: f32) -> SliceImage {
        SliceImage {
            order: Some(order),
            position: Some([0.0, 0.0, z]),
            pixels: Array2::from_elem((2, 3), value),
        }
    }

    #[test]
    fn test_sort_ascending_position() {
        let mut images = vec![slice(5.0, 5.0, 2.0), slice(-1.0, -1.0, 0.0), slice(2.0, 2.0, 1.0)];
        VolumeLoader::sort_images(&mut images, SortBy::ImagePositionPatient);

        let volume = VolumeLoader::build_volume_array(&images);
        assert_eq!(volume.dim(), (3, 2, 3));
        assert_eq!(volume[[0, 0, 0]], 0.0);
        assert_eq!(volume[[2, 1, 2]], 2.0);
    }

    #[test]
    fn test_sort_none_keeps_order() {
        let mut images = vec![slice(5.0, 5.0, 2.0), slice(-1.0, -1.0, 0.0)];
        VolumeLoader::sort_images(&mut images, SortBy::None);
        assert_eq!(images[0].order, Some(5.0));
    }

    #[test]
    fn test_inconsistent_dimensions() {
        let mut odd = slice(1.0, 1.0, 0.0);
        odd.pixels = Array2::zeros((3, 3));
        let images = vec![slice(0.0, 0.0, 0.0), odd];

        assert!(matches!(
            VolumeLoader::validate_dimensions(&images),
            Err(VolumeLoaderError::InconsistentDimensions)
        ));
    }

    #[test]
    fn test_slice_spacing_fallbacks() {
        let positions = [Some([0.0, 0.0, 1.0]), Some([0.0, 0.0, 3.5])];
        assert_eq!(VolumeLoader::slice_spacing(&positions, Some(1.0)), 2.5);
        assert_eq!(VolumeLoader::slice_spacing(&[None, None], Some(1.25)), 1.25);
        assert_eq!(VolumeLoader::slice_spacing(&[Some([0.0; 3])], None), 1.0);
    }

    #[test]
    fn test_descending_positions_are_reversed() {
        // instance order runs head to feet
        let images = vec![slice(1.0, 10.0, 3.0), slice(2.0, 8.0, 2.0), slice(3.0, 6.0, 1.0)];
        let volume = VolumeLoader::assemble(images, (1.0, 1.0), None).unwrap();

        assert_eq!(volume.origin(), [0.0, 0.0, 6.0]);
        assert_eq!(&volume.bounds()[4..], &[6.0, 10.0]);
        assert_eq!(volume.sample(&Point3D::new(0.0, 0.0, 6.0)), 1.0);
        assert_eq!(volume.sample(&Point3D::new(1.0, 1.0, 10.0)), 3.0);
        assert!((volume.sample(&Point3D::new(0.0, 0.0, 9.0)) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_ascending_positions_are_kept() {
        let images = vec![slice(1.0, -4.0, 0.0), slice(2.0, -1.5, 5.0)];
        let volume = VolumeLoader::assemble(images, (0.5, 0.75), Some(3.0)).unwrap();

        assert_eq!(volume.origin(), [0.0, 0.0, -4.0]);
        assert_eq!(volume.bounds(), [0.0, 1.5, 0.0, 0.5, -4.0, -1.5]);
        assert_eq!(volume.sample(&Point3D::new(0.0, 0.0, -1.5)), 5.0);
    }

    #[test]
    fn test_missing_directory() {
        let result = VolumeLoader::default().load(Path::new("/nonexistent/dicom/series"));
        assert!(result.is_err());
    }
}
