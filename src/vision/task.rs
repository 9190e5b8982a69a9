//! Recognition tasks, batches and per-task outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::OcrError;
use crate::geometry::{DisplaySpace, Rect};
use crate::vision::engine::{LanguageSet, SegmentationMode};

/// Engine variable restricting the recognized characters
pub const CHAR_WHITELIST: &str = "tessedit_char_whitelist";

/// One region of one captured image to recognize
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecognitionTask {
    /// Only honored when a session is established (first task of a batch)
    pub languages: Option<LanguageSet>,
    /// Selection in display coordinates; whole image when unset
    pub region: Option<Rect<DisplaySpace>>,
    pub segmentation_mode: Option<SegmentationMode>,
    /// Engine variables; inherited from earlier tasks when unset
    pub parameters: Option<BTreeMap<String, String>>,
}

impl RecognitionTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = Some(languages.into_iter().collect());
        self
    }

    pub fn with_region(mut self, region: Rect<DisplaySpace>) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_mode(mut self, mode: SegmentationMode) -> Self {
        self.segmentation_mode = Some(mode);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A single task or an ordered sequence; the output takes the same shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskBatch {
    // Listed first: a struct also deserializes from a JSON array
    Many(Vec<RecognitionTask>),
    Single(RecognitionTask),
}

impl TaskBatch {
    pub fn tasks(&self) -> &[RecognitionTask] {
        match self {
            TaskBatch::Single(task) => std::slice::from_ref(task),
            TaskBatch::Many(tasks) => tasks,
        }
    }

    /// Wrap outcomes in the shape of this batch
    pub(crate) fn shape(&self, mut outcomes: Vec<TaskOutcome>) -> BatchOutput {
        match self {
            TaskBatch::Single(_) if outcomes.len() == 1 => BatchOutput::Single(outcomes.remove(0)),
            _ => BatchOutput::Many(outcomes),
        }
    }
}

impl From<RecognitionTask> for TaskBatch {
    fn from(task: RecognitionTask) -> Self {
        TaskBatch::Single(task)
    }
}

impl From<Vec<RecognitionTask>> for TaskBatch {
    fn from(tasks: Vec<RecognitionTask>) -> Self {
        TaskBatch::Many(tasks)
    }
}

/// Result of one task: recognized text (possibly empty) or a typed failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Recognized(String),
    Failed(OcrError),
}

impl TaskOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            TaskOutcome::Recognized(text) => Some(text),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&OcrError> {
        match self {
            TaskOutcome::Recognized(_) => None,
            TaskOutcome::Failed(err) => Some(err),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Recognized(text) => f.write_str(text),
            TaskOutcome::Failed(err) => write!(f, "[failed: {}]", err),
        }
    }
}

/// Batch result mirroring the shape of the [`TaskBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutput {
    Single(TaskOutcome),
    Many(Vec<TaskOutcome>),
}

impl BatchOutput {
    pub fn outcomes(&self) -> &[TaskOutcome] {
        match self {
            BatchOutput::Single(outcome) => std::slice::from_ref(outcome),
            BatchOutput::Many(outcomes) => outcomes,
        }
    }

    pub fn into_vec(self) -> Vec<TaskOutcome> {
        match self {
            BatchOutput::Single(outcome) => vec![outcome],
            BatchOutput::Many(outcomes) => outcomes,
        }
    }
}

/// Clean raw engine output for a task's segmentation mode
///
/// Line and character oriented modes read short structured fields where
/// embedded whitespace is noise, so all of it goes. Other modes keep inner
/// line breaks and only trim the ends.
pub fn post_process(raw: &str, mode: Option<SegmentationMode>) -> String {
    match mode {
        Some(mode) if mode.strips_whitespace() => raw.chars().filter(|c| !c.is_whitespace()).collect(),
        _ => raw.trim().to_string(),
    }
}
