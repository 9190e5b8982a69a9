//! Capture Layer
//!
//! Narrow interface to whatever produces photos: a camera on a handheld
//! device, or a still image on disk for the command-line tool. Device
//! features such as torch or flash are negotiated through a plain boolean
//! feature set.

pub mod frame;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::geometry::{DisplaySpace, Size};
use frame::CapturedFrame;

/// Optional hardware features a capture source supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCapabilities {
    /// Continuous light
    pub torch: bool,
    /// Flash fired with the shot
    pub flash: bool,
    /// Focus can be adjusted before the shot
    pub autofocus: bool,
}

/// Anything that can hand over a captured frame
pub trait CaptureSource {
    /// Features this source supports
    fn capabilities(&self) -> CaptureCapabilities;

    /// Take (or load) one frame
    fn capture(&mut self) -> Result<CapturedFrame>;
}

/// Still image read from disk
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    viewport: Option<Size<DisplaySpace>>,
}

impl FileCapture {
    /// `viewport` is the display size the selection was made in; the
    /// image's own size when unset
    pub fn new(path: impl Into<PathBuf>, viewport: Option<Size<DisplaySpace>>) -> Self {
        Self {
            path: path.into(),
            viewport,
        }
    }
}

impl CaptureSource for FileCapture {
    fn capabilities(&self) -> CaptureCapabilities {
        CaptureCapabilities::default()
    }

    fn capture(&mut self) -> Result<CapturedFrame> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read image {:?}", self.path))?;
        let frame = CapturedFrame::decode(&bytes, self.viewport)
            .with_context(|| format!("Failed to load image {:?}", self.path))?;

        let (width, height) = frame.dimensions();
        info!("Loaded {}x{} frame from {:?}", width, height, self.path);
        Ok(frame)
    }
}
