//! Recognition engine abstraction
//!
//! The session talks to the engine only through [`RecognitionEngine`] and
//! builds engines through an [`EngineFactory`], so the production Tesseract
//! backend can be swapped for a fake in tests.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::geometry::PixelRegion;
use crate::vision::WorkingImage;

/// Layout hint for the engine's page segmentation
///
/// Column-oriented here means one vertical run of glyphs (`SingleBlockVertical`),
/// not `SingleColumn`, which still reads multi-line blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fully automatic, multiple blocks
    Auto,
    /// A single column of text of variable sizes
    SingleColumn,
    /// A single uniform block of vertically aligned text
    SingleBlockVertical,
    /// A single uniform block of horizontal text
    SingleBlock,
    /// A single text line
    SingleLine,
    /// A single word
    SingleWord,
    /// A single character
    SingleChar,
    /// As much text as possible, in no particular order
    SparseText,
}

impl SegmentationMode {
    /// Tesseract page segmentation mode number
    pub fn psm(&self) -> i32 {
        match self {
            SegmentationMode::Auto => 3,
            SegmentationMode::SingleColumn => 4,
            SegmentationMode::SingleBlockVertical => 5,
            SegmentationMode::SingleBlock => 6,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::SingleWord => 8,
            SegmentationMode::SingleChar => 10,
            SegmentationMode::SparseText => 11,
        }
    }

    /// Modes used for short structured fields (prices, codes, vertical
    /// labels) where any whitespace in the output is noise
    pub fn strips_whitespace(&self) -> bool {
        matches!(
            self,
            SegmentationMode::SingleBlockVertical
                | SegmentationMode::SingleLine
                | SegmentationMode::SingleWord
                | SegmentationMode::SingleChar
        )
    }
}

/// Ordered, duplicate-free list of engine language codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LanguageSet(Vec<String>);

impl LanguageSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Engine argument form, e.g. `chi_tra+chi_sim+eng`
    pub fn to_engine_arg(&self) -> String {
        self.0.join("+")
    }
}

impl<S: Into<String>> FromIterator<S> for LanguageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut languages: Vec<String> = Vec::new();
        for lang in iter {
            let lang = lang.into().trim().to_string();
            if !lang.is_empty() && !languages.contains(&lang) {
                languages.push(lang);
            }
        }
        Self(languages)
    }
}

impl From<Vec<String>> for LanguageSet {
    fn from(languages: Vec<String>) -> Self {
        languages.into_iter().collect()
    }
}

impl From<LanguageSet> for Vec<String> {
    fn from(set: LanguageSet) -> Self {
        set.0
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_engine_arg())
    }
}

/// Parameters currently applied to an engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineParameters {
    /// Page segmentation mode, engine default when unset
    pub segmentation_mode: Option<SegmentationMode>,
    /// Engine variables such as `tessedit_char_whitelist`
    pub variables: BTreeMap<String, String>,
}

impl EngineParameters {
    /// Layer a task's settings over these; unset values are inherited
    pub fn merged_with(
        &self,
        segmentation_mode: Option<SegmentationMode>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let mut merged = self.clone();
        if let Some(mode) = segmentation_mode {
            merged.segmentation_mode = Some(mode);
        }
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                merged.variables.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// A stateful text-recognition engine bound to one language set
pub trait RecognitionEngine: Send {
    /// Replace the engine's parameters; they stay in effect for later calls
    fn set_parameters(&mut self, parameters: &EngineParameters) -> Result<()>;

    /// Recognize text inside `region` of the working image
    fn recognize(&mut self, image: &WorkingImage, region: PixelRegion) -> Result<String>;
}

/// Builds engines for a language set
pub trait EngineFactory: Send + Sync {
    fn create(&self, languages: &LanguageSet) -> Result<Box<dyn RecognitionEngine>>;
}
