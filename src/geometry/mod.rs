//! Coordinate spaces and space-tagged rectangles
//!
//! A region selected on screen passes through three coordinate spaces before
//! it reaches the recognition engine: the display viewport, the native
//! capture frame, and the upscaled working image. Every rectangle carries
//! its space in its type, so a display-space selection can only reach the
//! engine through [`map_rect`].

pub mod mapping;

pub use mapping::map_rect;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::OcrError;

/// Marker trait for a named coordinate space
pub trait CoordinateSpace: Copy + Debug + Default + PartialEq {
    /// Name used in log and error messages
    const NAME: &'static str;
}

/// On-screen display viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySpace;

/// Native capture frame coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSpace;

/// Upscaled working image coordinates (what the engine sees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkingSpace;

impl CoordinateSpace for DisplaySpace {
    const NAME: &'static str = "display";
}

impl CoordinateSpace for CaptureSpace {
    const NAME: &'static str = "capture";
}

impl CoordinateSpace for WorkingSpace {
    const NAME: &'static str = "working";
}

/// Width and height in a given coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size<S: CoordinateSpace> {
    pub width: f32,
    pub height: f32,
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: CoordinateSpace> Size<S> {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Width divided by height
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// True when either side is zero, negative or not finite
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned rectangle (left, top, width, height) in space `S`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect<S: CoordinateSpace> {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: CoordinateSpace> Rect<S> {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Rectangle covering a whole frame of the given size
    pub fn full(size: Size<S>) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// True when the rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when all four fields are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Re-tag into another space. Only the mapper performs conversions.
    pub(crate) fn retag<T: CoordinateSpace>(self) -> Rect<T> {
        Rect::new(self.left, self.top, self.width, self.height)
    }

    /// Snap the edges to whole pixels and clamp them into `bounds`
    ///
    /// Fails with `InvalidRegion` when nothing of the rectangle survives.
    pub fn clamp_to(&self, bounds: Size<S>) -> Result<Self, OcrError> {
        if !self.is_finite() {
            return Err(OcrError::InvalidRegion(format!(
                "{} rect ({}, {}, {}x{}) is not finite",
                S::NAME,
                self.left,
                self.top,
                self.width,
                self.height
            )));
        }

        let left = self.left.round().clamp(0.0, bounds.width);
        let top = self.top.round().clamp(0.0, bounds.height);
        let right = self.right().round().clamp(0.0, bounds.width);
        let bottom = self.bottom().round().clamp(0.0, bounds.height);

        if right <= left || bottom <= top {
            return Err(OcrError::InvalidRegion(format!(
                "{} rect ({}, {}, {}x{}) has no area inside {}x{}",
                S::NAME,
                self.left,
                self.top,
                self.width,
                self.height,
                bounds.width,
                bounds.height
            )));
        }

        Ok(Self::new(left, top, right - left, bottom - top))
    }
}

/// Whole-pixel region of the working image handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect<WorkingSpace> {
    /// Convert a clamped working-space rectangle into pixel coordinates
    pub fn to_pixel_region(&self) -> PixelRegion {
        PixelRegion {
            x: self.left.max(0.0).round() as u32,
            y: self.top.max(0.0).round() as u32,
            width: self.width.max(0.0).round() as u32,
            height: self.height.max(0.0).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside_is_noop() {
        let rect = Rect::<WorkingSpace>::new(10.0, 20.0, 30.0, 40.0);
        let clamped = rect.clamp_to(Size::new(100.0, 100.0)).unwrap();
        assert_eq!(clamped, rect);
    }

    #[test]
    fn test_clamp_overflow_is_trimmed() {
        let rect = Rect::<WorkingSpace>::new(-3.0, 90.0, 50.0, 14.0);
        let clamped = rect.clamp_to(Size::new(100.0, 100.0)).unwrap();
        assert_eq!(clamped, Rect::new(0.0, 90.0, 47.0, 10.0));
    }

    #[test]
    fn test_clamp_outside_is_invalid() {
        let rect = Rect::<WorkingSpace>::new(120.0, 10.0, 20.0, 20.0);
        let err = rect.clamp_to(Size::new(100.0, 100.0)).unwrap_err();
        assert!(matches!(err, OcrError::InvalidRegion(_)));
    }

    #[test]
    fn test_clamp_rejects_non_finite() {
        let bounds = Size::new(100.0, 100.0);
        for rect in [
            Rect::<WorkingSpace>::new(f32::NAN, 10.0, 20.0, 20.0),
            Rect::<WorkingSpace>::new(10.0, 10.0, f32::NAN, 20.0),
            Rect::<WorkingSpace>::new(10.0, 10.0, f32::INFINITY, 20.0),
            Rect::<WorkingSpace>::new(f32::NEG_INFINITY, 10.0, 20.0, 20.0),
        ] {
            let err = rect.clamp_to(bounds).unwrap_err();
            assert!(matches!(err, OcrError::InvalidRegion(_)), "{:?}", rect);
        }
    }

    #[test]
    fn test_pixel_region() {
        let rect = Rect::<WorkingSpace>::new(4.0, 6.0, 10.0, 12.0);
        assert_eq!(
            rect.to_pixel_region(),
            PixelRegion { x: 4, y: 6, width: 10, height: 12 }
        );
    }

    #[test]
    fn test_rect_deserializes_without_space_field() {
        let rect: Rect<DisplaySpace> =
            serde_json::from_str(r#"{"left": 1.0, "top": 2.0, "width": 3.0, "height": 4.0}"#).unwrap();
        assert_eq!(rect, Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_degenerate_size() {
        assert!(Size::<DisplaySpace>::new(0.0, 10.0).is_degenerate());
        assert!(Size::<DisplaySpace>::new(f32::NAN, 10.0).is_degenerate());
        assert!(!Size::<DisplaySpace>::new(10.0, 10.0).is_degenerate());
    }
}
