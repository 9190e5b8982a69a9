//! Image preprocessing for text recognition
//!
//! Turns a captured RGBA photo into a monochrome working image that the
//! recognition engine reads reliably under uneven lighting:
//!
//! 1. nearest-neighbour upscale by a fixed integer factor
//! 2. global luma statistics (min, max, mean)
//! 3. linear contrast stretch of the observed luma range
//! 4. polarity normalization so text ends up dark on a light ground
//! 5. quadratic tone compression (no hard binarization)

use image::RgbaImage;
use tracing::debug;

use crate::config::PreprocessingConfig;
use crate::error::OcrError;
use crate::geometry::{Size, WorkingSpace};

/// Default integer upscale applied before recognition
pub const UPSCALE_FACTOR: u32 = 2;

/// Mean luma (0-255) below which the background is treated as dark
pub const DARK_BACKGROUND_THRESHOLD: f32 = 100.0;

/// Captured RGBA raster, row-major, four interleaved channels per pixel
pub type RasterImage = RgbaImage;

/// Upscaled, tone-mapped image handed to the recognition engine
///
/// Dimensions are always the capture dimensions times `scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingImage {
    image: RgbaImage,
    scale: u32,
}

impl WorkingImage {
    /// Pixel data
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Upscale factor relative to the captured frame
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bounds in working-space coordinates
    pub fn size(&self) -> Size<WorkingSpace> {
        Size::new(self.width() as f32, self.height() as f32)
    }

    /// Give up the wrapper and keep the pixels
    pub fn into_inner(self) -> RgbaImage {
        self.image
    }
}

/// Global luma statistics of an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl LumaStats {
    /// Gather min, max and mean luma over RGBA pixel data
    pub fn collect(data: &[u8]) -> Self {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum = 0.0f64;
        let mut count = 0usize;

        for chunk in data.chunks_exact(4) {
            let y = luma(chunk[0], chunk[1], chunk[2]);
            min = min.min(y);
            max = max.max(y);
            sum += y as f64;
            count += 1;
        }

        if count == 0 {
            return Self { min: 0.0, max: 0.0, mean: 0.0 };
        }

        Self {
            min,
            max,
            mean: (sum / count as f64) as f32,
        }
    }

    /// Light text on a dark ground (e.g. a backlit menu board)
    pub fn is_dark_background(&self, threshold: f32) -> bool {
        self.mean < threshold
    }

    /// Multiplier that maps [min, max] onto [0, 255]; 1 for flat images
    pub fn stretch_scale(&self) -> f32 {
        if self.max == self.min {
            1.0
        } else {
            255.0 / (self.max - self.min)
        }
    }

    /// Linear contrast stretch of a single luma value
    pub fn stretch(&self, y: f32) -> f32 {
        ((y - self.min) * self.stretch_scale()).clamp(0.0, 255.0)
    }
}

/// Rec. 709 luma
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
}

/// Run the full preprocessing pipeline on a captured image
pub fn preprocess(image: &RasterImage, settings: &PreprocessingConfig) -> Result<WorkingImage, OcrError> {
    let (width, height) = image.dimensions();
    let scale = settings.upscale_factor.max(1);

    if width == 0 || height == 0 {
        return Err(OcrError::SurfaceUnavailable(format!(
            "captured image is {}x{}",
            width, height
        )));
    }

    let (new_width, new_height) = match (width.checked_mul(scale), height.checked_mul(scale)) {
        (Some(w), Some(h)) if (w as u64) * (h as u64) * 4 <= isize::MAX as u64 => (w, h),
        _ => {
            return Err(OcrError::SurfaceUnavailable(format!(
                "{}x{} upscaled by {} does not fit in memory",
                width, height, scale
            )))
        }
    };

    let mut data = apply_upscale(image.as_raw(), width, height, scale);

    let stats = LumaStats::collect(&data);
    let dark = stats.is_dark_background(settings.dark_background_threshold);

    debug!(
        "Preprocessing {}x{} -> {}x{}: luma min={:.1} max={:.1} mean={:.1} dark_background={}",
        width, height, new_width, new_height, stats.min, stats.max, stats.mean, dark
    );

    apply_tone_map(&mut data, &stats, dark);

    let image = RgbaImage::from_raw(new_width, new_height, data).ok_or_else(|| {
        OcrError::SurfaceUnavailable(format!("working buffer does not match {}x{}", new_width, new_height))
    })?;

    Ok(WorkingImage { image, scale })
}

/// Nearest-neighbour upscale of RGBA data by an integer factor
fn apply_upscale(data: &[u8], width: u32, height: u32, scale: u32) -> Vec<u8> {
    if scale <= 1 {
        return data.to_vec();
    }

    let w = width as usize;
    let s = scale as usize;
    let row_bytes = w * 4;
    let mut result = Vec::with_capacity(row_bytes * s * height as usize * s);

    for ny in 0..(height as usize * s) {
        let src_row = ny / s;
        let row = &data[src_row * row_bytes..(src_row + 1) * row_bytes];
        for pixel in row.chunks_exact(4) {
            for _ in 0..s {
                result.extend_from_slice(pixel);
            }
        }
    }

    result
}

/// Stretch, normalize polarity and tone-compress luma into R, G and B
fn apply_tone_map(data: &mut [u8], stats: &LumaStats, dark_background: bool) {
    for chunk in data.chunks_exact_mut(4) {
        let y = luma(chunk[0], chunk[1], chunk[2]);
        let stretched = stats.stretch(y);
        let normalized = if dark_background { 255.0 - stretched } else { stretched };
        let value = (normalized * normalized / 255.0).round().clamp(0.0, 255.0) as u8;
        chunk[0] = value;
        chunk[1] = value;
        chunk[2] = value;
        // Alpha unchanged
    }
}
