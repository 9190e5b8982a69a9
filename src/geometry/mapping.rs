//! Display → capture → working image rectangle mapping
//!
//! The display shows the capture frame "cover"-style: scaled to fill the
//! viewport and centered, with the overflowing axis cropped equally on
//! both sides. Mapping a selection back means undoing that crop and then
//! applying the preprocessor's upscale.

use tracing::debug;

use super::{CaptureSpace, DisplaySpace, Rect, Size, WorkingSpace};
use crate::error::OcrError;

/// Which capture axis is cut off by the display viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropAxis {
    /// Aspect ratios match; the whole frame is visible
    None,
    /// Capture is wider than the display; left and right are cropped
    Horizontal,
    /// Capture is taller than the display; top and bottom are cropped
    Vertical,
}

/// Visible portion of a capture frame for one display viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropTransform {
    /// Cropped axis
    pub axis: CropAxis,
    /// Visible sub-rectangle of the capture frame
    pub visible: Rect<CaptureSpace>,
    /// Capture pixels per display unit
    pub scale_to_capture: f32,
}

impl CropTransform {
    /// Compare the viewport and capture aspect ratios and derive the crop
    pub fn compute(display: Size<DisplaySpace>, capture: Size<CaptureSpace>) -> Result<Self, OcrError> {
        if display.is_degenerate() || capture.is_degenerate() {
            return Err(OcrError::InvalidRegion(format!(
                "cannot map between display {}x{} and capture {}x{}",
                display.width, display.height, capture.width, capture.height
            )));
        }

        let display_aspect = display.aspect();
        let capture_aspect = capture.aspect();

        let transform = if capture_aspect > display_aspect {
            let visible_w = capture.height * display_aspect;
            Self {
                axis: CropAxis::Horizontal,
                visible: Rect::new((capture.width - visible_w) / 2.0, 0.0, visible_w, capture.height),
                scale_to_capture: visible_w / display.width,
            }
        } else if capture_aspect < display_aspect {
            let visible_h = capture.width / display_aspect;
            Self {
                axis: CropAxis::Vertical,
                visible: Rect::new(0.0, (capture.height - visible_h) / 2.0, capture.width, visible_h),
                scale_to_capture: capture.width / display.width,
            }
        } else {
            Self {
                axis: CropAxis::None,
                visible: Rect::full(capture),
                scale_to_capture: capture.width / display.width,
            }
        };

        Ok(transform)
    }

    /// Express a display-space rectangle in capture coordinates
    pub fn to_capture(&self, rect: Rect<DisplaySpace>) -> Rect<CaptureSpace> {
        let s = self.scale_to_capture;
        Rect::new(
            self.visible.left + rect.left * s,
            self.visible.top + rect.top * s,
            rect.width * s,
            rect.height * s,
        )
    }
}

/// Map a display-space selection into working image coordinates
///
/// `working_scale` is the preprocessor's upscale factor. The result is
/// clamped to the working image; a selection that keeps no area after
/// clamping is an `InvalidRegion`. A zero-area selection is mapped but not
/// clamped, since its degeneracy is the caller's concern. Non-finite
/// selections are an `InvalidRegion`.
pub fn map_rect(
    rect: Rect<DisplaySpace>,
    display: Size<DisplaySpace>,
    capture: Size<CaptureSpace>,
    working_scale: u32,
) -> Result<Rect<WorkingSpace>, OcrError> {
    if !rect.is_finite() {
        return Err(OcrError::InvalidRegion(format!(
            "selection ({}, {}, {}x{}) is not finite",
            rect.left, rect.top, rect.width, rect.height
        )));
    }

    let crop = CropTransform::compute(display, capture)?;
    let captured = crop.to_capture(rect);

    let f = working_scale as f32;
    let working = captured.retag::<WorkingSpace>().scaled(f);

    if rect.is_empty() {
        return Ok(working);
    }

    let bounds = Size::<WorkingSpace>::new(capture.width * f, capture.height * f);
    let clamped = working.clamp_to(bounds)?;

    debug!(
        "Mapped {:?} crop: display ({}, {}, {}x{}) -> working ({}, {}, {}x{})",
        crop.axis,
        rect.left,
        rect.top,
        rect.width,
        rect.height,
        clamped.left,
        clamped.top,
        clamped.width,
        clamped.height
    );

    Ok(clamped)
}

/// Full working image rectangle for a capture of the given size
pub fn full_working_rect(capture: Size<CaptureSpace>, working_scale: u32) -> Rect<WorkingSpace> {
    Rect::full(capture)
        .retag::<WorkingSpace>()
        .scaled(working_scale as f32)
}

impl<S: super::CoordinateSpace> Rect<S> {
    fn scaled(self, f: f32) -> Self {
        Rect::new(self.left * f, self.top * f, self.width * f, self.height * f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(w: f32, h: f32) -> Size<DisplaySpace> {
        Size::new(w, h)
    }

    fn capture(w: f32, h: f32) -> Size<CaptureSpace> {
        Size::new(w, h)
    }

    #[test]
    fn test_equal_aspect_is_uniform_scaling() {
        let crop = CropTransform::compute(display(400.0, 300.0), capture(800.0, 600.0)).unwrap();
        assert_eq!(crop.axis, CropAxis::None);
        assert_eq!(crop.visible.left, 0.0);
        assert_eq!(crop.visible.top, 0.0);
        assert_eq!(crop.scale_to_capture, 2.0);

        let mapped = map_rect(
            Rect::new(10.0, 20.0, 100.0, 50.0),
            display(400.0, 300.0),
            capture(800.0, 600.0),
            2,
        )
        .unwrap();
        assert_eq!(mapped, Rect::new(40.0, 80.0, 400.0, 200.0));
    }

    #[test]
    fn test_wider_capture_crops_horizontally() {
        // 16:9 capture on a 1:1 viewport
        let crop = CropTransform::compute(display(900.0, 900.0), capture(1600.0, 900.0)).unwrap();
        assert_eq!(crop.axis, CropAxis::Horizontal);
        assert!((crop.visible.width - 900.0).abs() < 1e-3);
        assert!((crop.visible.left - 350.0).abs() < 1e-3);
        assert!((crop.scale_to_capture - 1.0).abs() < 1e-6);

        let mapped = map_rect(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            display(900.0, 900.0),
            capture(1600.0, 900.0),
            2,
        )
        .unwrap();
        assert_eq!(mapped, Rect::new(700.0, 0.0, 200.0, 200.0));
    }

    #[test]
    fn test_taller_capture_crops_vertically() {
        // Portrait phone viewport over a 4:3 landscape frame
        let crop = CropTransform::compute(display(400.0, 200.0), capture(400.0, 300.0)).unwrap();
        assert_eq!(crop.axis, CropAxis::Vertical);
        assert!((crop.visible.height - 200.0).abs() < 1e-3);
        assert!((crop.visible.top - 50.0).abs() < 1e-3);
        assert!((crop.scale_to_capture - 1.0).abs() < 1e-6);

        let mapped = map_rect(
            Rect::new(10.0, 10.0, 20.0, 20.0),
            display(400.0, 200.0),
            capture(400.0, 300.0),
            2,
        )
        .unwrap();
        assert_eq!(mapped, Rect::new(20.0, 120.0, 40.0, 40.0));
    }

    #[test]
    fn test_scale_agrees_on_both_axes() {
        let crop = CropTransform::compute(display(360.0, 640.0), capture(1920.0, 1080.0)).unwrap();
        let via_height = crop.visible.height / 640.0;
        assert!((crop.scale_to_capture - via_height).abs() < 1e-4);
    }

    #[test]
    fn test_small_overflow_is_clamped() {
        let mapped = map_rect(
            Rect::new(390.0, 290.0, 12.0, 12.0),
            display(400.0, 300.0),
            capture(400.0, 300.0),
            2,
        )
        .unwrap();
        assert_eq!(mapped, Rect::new(780.0, 580.0, 20.0, 20.0));
    }

    #[test]
    fn test_region_outside_frame_is_invalid() {
        let err = map_rect(
            Rect::new(500.0, 10.0, 20.0, 20.0),
            display(400.0, 300.0),
            capture(400.0, 300.0),
            2,
        )
        .unwrap_err();
        assert!(matches!(err, OcrError::InvalidRegion(_)));
    }

    #[test]
    fn test_zero_area_passes_through() {
        let mapped = map_rect(
            Rect::new(10.0, 10.0, 0.0, 0.0),
            display(400.0, 300.0),
            capture(400.0, 300.0),
            2,
        )
        .unwrap();
        assert_eq!(mapped, Rect::new(20.0, 20.0, 0.0, 0.0));
    }

    #[test]
    fn test_non_finite_selection_is_invalid() {
        for rect in [
            Rect::new(f32::NAN, 10.0, 20.0, 20.0),
            Rect::new(10.0, 10.0, f32::NAN, 20.0),
            Rect::new(10.0, 10.0, f32::INFINITY, 20.0),
            Rect::new(f32::INFINITY, 10.0, 20.0, 20.0),
            // Zero area would otherwise skip clamping
            Rect::new(f32::NAN, 10.0, 0.0, 0.0),
        ] {
            let err = map_rect(rect, display(100.0, 100.0), capture(100.0, 100.0), 2).unwrap_err();
            assert!(matches!(err, OcrError::InvalidRegion(_)), "{:?}", rect);
        }
    }

    #[test]
    fn test_degenerate_viewport_is_invalid() {
        let err = CropTransform::compute(display(0.0, 300.0), capture(400.0, 300.0)).unwrap_err();
        assert!(matches!(err, OcrError::InvalidRegion(_)));
    }

    #[test]
    fn test_full_working_rect() {
        let rect = full_working_rect(capture(320.0, 240.0), 2);
        assert_eq!(rect, Rect::new(0.0, 0.0, 640.0, 480.0));
    }
}
