//! Frame data structures for captured photos

use std::time::Instant;

use crate::error::OcrError;
use crate::geometry::{CaptureSpace, DisplaySpace, Size};
use crate::vision::RasterImage;

/// A captured photo together with the viewport it was shown in
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Decoded RGBA pixels at native capture resolution
    image: RasterImage,
    /// Display viewport the frame was shown in when the region was selected
    viewport: Size<DisplaySpace>,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a frame shown in `viewport`
    pub fn new(image: RasterImage, viewport: Size<DisplaySpace>) -> Self {
        Self {
            image,
            viewport,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame whose viewport matches its own pixel size (no crop)
    pub fn with_native_viewport(image: RasterImage) -> Self {
        let viewport = Size::new(image.width() as f32, image.height() as f32);
        Self::new(image, viewport)
    }

    /// Decode an encoded image payload (PNG, JPEG, ...)
    pub fn decode(bytes: &[u8], viewport: Option<Size<DisplaySpace>>) -> Result<Self, OcrError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| OcrError::DecodeFailure(e.to_string()))?;
        let image = decoded.to_rgba8();
        Ok(match viewport {
            Some(viewport) => Self::new(image, viewport),
            None => Self::with_native_viewport(image),
        })
    }

    /// Wrap raw RGBA pixels
    pub fn from_rgba(
        data: Vec<u8>,
        width: u32,
        height: u32,
        viewport: Option<Size<DisplaySpace>>,
    ) -> Result<Self, OcrError> {
        let len = data.len();
        let image = RasterImage::from_raw(width, height, data).ok_or_else(|| {
            OcrError::SurfaceUnavailable(format!(
                "{} bytes cannot form a {}x{} RGBA surface",
                len, width, height
            ))
        })?;
        Ok(match viewport {
            Some(viewport) => Self::new(image, viewport),
            None => Self::with_native_viewport(image),
        })
    }

    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    pub fn viewport(&self) -> Size<DisplaySpace> {
        self.viewport
    }

    /// Native capture size
    pub fn capture_size(&self) -> Size<CaptureSpace> {
        Size::new(self.image.width() as f32, self.image.height() as f32)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_decode_png() {
        let frame = CapturedFrame::decode(&png_bytes(8, 6), None).unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.viewport(), Size::new(8.0, 6.0));
        assert_eq!(frame.capture_size(), Size::new(8.0, 6.0));
    }

    #[test]
    fn test_decode_keeps_viewport() {
        let frame = CapturedFrame::decode(&png_bytes(8, 6), Some(Size::new(300.0, 600.0))).unwrap();
        assert_eq!(frame.viewport(), Size::new(300.0, 600.0));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = CapturedFrame::decode(b"definitely not an image", None).unwrap_err();
        assert!(matches!(err, OcrError::DecodeFailure(_)));
    }

    #[test]
    fn test_from_rgba_checks_length() {
        let err = CapturedFrame::from_rgba(vec![0; 7], 2, 1, None).unwrap_err();
        assert!(matches!(err, OcrError::SurfaceUnavailable(_)));

        let frame = CapturedFrame::from_rgba(vec![0; 8], 2, 1, None).unwrap();
        assert_eq!(frame.dimensions(), (2, 1));
    }
}
