//! Tesseract OCR backend
//!
//! Drives the system `tesseract` binary through rusty-tesseract. Language
//! packs are checked once when the engine is created.

use anyhow::{bail, Context, Result};
use image::DynamicImage;
use rusty_tesseract::{Args, Image};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::RecognitionConfig;
use crate::geometry::PixelRegion;
use crate::vision::engine::{EngineFactory, EngineParameters, LanguageSet, RecognitionEngine};
use crate::vision::WorkingImage;

/// Creates [`TesseractEngine`]s with shared engine settings
#[derive(Debug, Clone)]
pub struct TesseractFactory {
    dpi: Option<i32>,
    oem: Option<i32>,
}

impl TesseractFactory {
    pub fn new(config: &RecognitionConfig) -> Self {
        Self {
            dpi: config.dpi,
            oem: config.oem,
        }
    }
}

impl EngineFactory for TesseractFactory {
    fn create(&self, languages: &LanguageSet) -> Result<Box<dyn RecognitionEngine>> {
        Ok(Box::new(TesseractEngine::new(languages, self.dpi, self.oem)?))
    }
}

/// Tesseract engine bound to one language set
pub struct TesseractEngine {
    args: Args,
}

impl TesseractEngine {
    /// Verify the binary and language packs, then build the engine
    pub fn new(languages: &LanguageSet, dpi: Option<i32>, oem: Option<i32>) -> Result<Self> {
        if languages.is_empty() {
            bail!("no recognition languages requested");
        }

        let version = rusty_tesseract::get_tesseract_version()
            .context("Tesseract is not installed or not on PATH")?;

        let installed = rusty_tesseract::get_tesseract_langs()
            .context("Failed to list installed Tesseract languages")?;
        let missing: Vec<&str> = languages
            .iter()
            .filter(|lang| !installed.iter().any(|i| i.as_str() == *lang))
            .collect();
        if !missing.is_empty() {
            bail!("Tesseract language data not installed: {}", missing.join(", "));
        }

        info!(
            "Tesseract {} initialized with languages: {}",
            version.trim(),
            languages
        );

        Ok(Self {
            args: build_args(languages, dpi, oem),
        })
    }
}

impl RecognitionEngine for TesseractEngine {
    fn set_parameters(&mut self, parameters: &EngineParameters) -> Result<()> {
        apply_parameters(&mut self.args, parameters);
        debug!(
            "Tesseract parameters: psm={:?} variables={:?}",
            self.args.psm, self.args.config_variables
        );
        Ok(())
    }

    fn recognize(&mut self, image: &WorkingImage, region: PixelRegion) -> Result<String> {
        let crop = image::imageops::crop_imm(image.image(), region.x, region.y, region.width, region.height)
            .to_image();
        let dynamic = DynamicImage::ImageRgba8(crop);

        let tess_image = Image::from_dynamic_image(&dynamic)
            .context("Failed to hand working image to Tesseract")?;

        let text = rusty_tesseract::image_to_string(&tess_image, &self.args)
            .context("Tesseract recognition failed")?;

        debug!(
            "Tesseract read {} chars from {}x{} at ({}, {})",
            text.chars().count(),
            region.width,
            region.height,
            region.x,
            region.y
        );

        Ok(text)
    }
}

/// Initial arguments for a fresh engine
fn build_args(languages: &LanguageSet, dpi: Option<i32>, oem: Option<i32>) -> Args {
    Args {
        lang: languages.to_engine_arg(),
        config_variables: HashMap::new(),
        dpi,
        psm: None,
        oem,
    }
}

/// Copy applied parameters into the command-line arguments
fn apply_parameters(args: &mut Args, parameters: &EngineParameters) {
    args.psm = parameters.segmentation_mode.map(|mode| mode.psm());
    args.config_variables = parameters
        .variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::SegmentationMode;

    #[test]
    fn test_build_args() {
        let languages: LanguageSet = ["chi_tra", "eng"].into_iter().collect();
        let args = build_args(&languages, Some(300), Some(1));
        assert_eq!(args.lang, "chi_tra+eng");
        assert_eq!(args.dpi, Some(300));
        assert_eq!(args.oem, Some(1));
        assert_eq!(args.psm, None);
        assert!(args.config_variables.is_empty());
    }

    #[test]
    fn test_apply_parameters() {
        let languages: LanguageSet = ["eng"].into_iter().collect();
        let mut args = build_args(&languages, None, None);

        let mut parameters = EngineParameters {
            segmentation_mode: Some(SegmentationMode::SingleLine),
            ..Default::default()
        };
        parameters
            .variables
            .insert("tessedit_char_whitelist".to_string(), "0123456789.".to_string());

        apply_parameters(&mut args, &parameters);
        assert_eq!(args.psm, Some(7));
        assert_eq!(
            args.config_variables.get("tessedit_char_whitelist").map(String::as_str),
            Some("0123456789.")
        );

        apply_parameters(&mut args, &EngineParameters::default());
        assert_eq!(args.psm, None);
        assert!(args.config_variables.is_empty());
    }
}
