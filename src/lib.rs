//! MenuLens recognition core
//!
//! Maps selections made on a display viewport onto a captured menu photo,
//! normalizes its contrast and reads the selected regions with a reusable
//! Tesseract session running on a background worker.

pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod storage;
pub mod vision;

pub use error::OcrError;
