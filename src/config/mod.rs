//! Application Configuration
//!
//! Preprocessing, recognition and diagnostics settings stored in TOML format.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::{DARK_BACKGROUND_THRESHOLD, UPSCALE_FACTOR};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Image preprocessing settings
    pub preprocessing: PreprocessingConfig,
    /// Recognition engine settings
    pub recognition: RecognitionConfig,
    /// Diagnostic output
    pub diagnostics: DiagnosticsConfig,
}

impl AppConfig {
    /// Reject settings the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.preprocessing.upscale_factor == 0 {
            bail!("preprocessing.upscale_factor must be at least 1");
        }
        if !(0.0..=255.0).contains(&self.preprocessing.dark_background_threshold) {
            bail!(
                "preprocessing.dark_background_threshold must be within 0-255, got {}",
                self.preprocessing.dark_background_threshold
            );
        }
        if self.recognition.default_languages.is_empty() {
            bail!("recognition.default_languages must name at least one language");
        }
        Ok(())
    }
}

/// Preprocessing pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Integer upscale applied before recognition
    pub upscale_factor: u32,
    /// Mean luma (0-255) below which the image is treated as light-on-dark
    pub dark_background_threshold: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            upscale_factor: UPSCALE_FACTOR,
            dark_background_threshold: DARK_BACKGROUND_THRESHOLD,
        }
    }
}

/// Recognition engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Languages used when a batch does not name any (Tesseract codes)
    pub default_languages: Vec<String>,
    /// Resolution hint passed to the engine
    pub dpi: Option<i32>,
    /// Engine mode (Tesseract OEM)
    pub oem: Option<i32>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            default_languages: vec![
                "chi_tra".to_string(),
                "chi_sim".to_string(),
                "eng".to_string(),
            ],
            dpi: Some(300),
            oem: Some(1),
        }
    }
}

/// Diagnostic output settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Write every working image to this PNG path
    pub dump_working_image: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
