//! Optional visualization sinks invoked after a successful reformation.

use crate::centerline::Centerline;
use crate::reformation::ReformationResult;
use crate::surface::Surface;
use crate::volume::Volume;

use image::ImageBuffer;
use image::Luma;
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Output {0} has no pixels to render")]
    Empty(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Everything a sink may draw
pub struct RenderScene<'a> {
    pub centerline: &'a Centerline,
    pub surfaces: &'a [Surface],
    pub result: &'a ReformationResult,
    pub volume: &'a Volume,
}

pub trait RenderSink {
    fn render(&self, scene: &RenderScene<'_>) -> Result<(), RenderError>;
}

/// Writes `cmpr.png` and `axial.png` 8-bit previews into a directory
#[derive(Debug, Clone)]
pub struct PngPreviewSink {
    pub directory: PathBuf,
}

impl PngPreviewSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[inline]
    fn normalize_to_u8(value: f32, low: f32, window: f32) -> u8 {
        if window <= 0.0 {
            return 0;
        }
        (((value - low) / window) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// First `width × height` block of `pixels`, mapped through the window
    fn to_image(
        pixels: &[f32],
        width: u32,
        height: u32,
        window: f32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let count = (width * height) as usize;
        let block = pixels.get(..count)?;
        let low = block.iter().copied().fold(f32::INFINITY, f32::min);
        let pixel_data: Vec<u8> = block
            .par_iter()
            .map(|&v| Self::normalize_to_u8(v, low, window))
            .collect();
        ImageBuffer::from_raw(width, height, pixel_data)
    }
}

impl RenderSink for PngPreviewSink {
    fn render(&self, scene: &RenderScene<'_>) -> Result<(), RenderError> {
        let result = scene.result;
        std::fs::create_dir_all(&self.directory)?;

        // image rows follow the centerline, columns the sweep
        let [rows, cols, _] = result.dimension_cmpr;
        let cmpr = Self::to_image(&result.pixels_cmpr, cols as u32, rows as u32, result.wwwl_cmpr[0])
            .ok_or(RenderError::Empty("cmpr"))?;
        cmpr.save(self.directory.join("cmpr.png"))?;

        let [size, _, _] = result.dimension_axial;
        let axial = Self::to_image(&result.pixels_axial, size as u32, size as u32, result.wwwl_axial[0])
            .ok_or(RenderError::Empty("axial"))?;
        axial.save(self.directory.join("axial.png"))?;

        log::info!(
            "Wrote previews to {} ({} centerline points, {} surfaces, volume {:?})",
            self.directory.display(),
            scene.centerline.len(),
            scene.surfaces.len(),
            scene.volume.dims()
        );
        Ok(())
    }
}
