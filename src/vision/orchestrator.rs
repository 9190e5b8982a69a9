//! Task orchestration
//!
//! Runs a batch of recognition tasks against one captured frame:
//! establish the session, preprocess once, then map, recognize and
//! post-process each task in order.
//!
//! Failure policy: errors that leave nothing to process (no surface,
//! undecodable input, no session) abort the batch. A task whose region is
//! invalid or whose recognition fails gets a [`TaskOutcome::Failed`] in its
//! slot and the remaining tasks still run.

use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::capture::frame::CapturedFrame;
use crate::config::{AppConfig, PreprocessingConfig};
use crate::error::OcrError;
use crate::geometry::mapping::full_working_rect;
use crate::geometry::map_rect;
use crate::vision::engine::{EngineFactory, LanguageSet};
use crate::vision::session::RecognitionSession;
use crate::vision::task::{post_process, BatchOutput, RecognitionTask, TaskBatch, TaskOutcome};
use crate::vision::{preprocess, WorkingImage};

/// Receives every working image before recognition, for debugging
pub type DiagnosticSink = Box<dyn Fn(&WorkingImage) + Send + Sync>;

/// Drives a [`RecognitionSession`] through batches of tasks
pub struct TaskOrchestrator {
    session: RecognitionSession,
    preprocessing: PreprocessingConfig,
    default_languages: LanguageSet,
    diagnostic_sink: Option<DiagnosticSink>,
}

impl TaskOrchestrator {
    pub fn new(factory: Arc<dyn EngineFactory>, config: &AppConfig) -> Self {
        Self {
            session: RecognitionSession::new(factory),
            preprocessing: config.preprocessing.clone(),
            default_languages: config.recognition.default_languages.iter().cloned().collect(),
            diagnostic_sink: None,
        }
    }

    /// Hand every working image to `sink` before it is recognized
    pub fn with_diagnostic_sink(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostic_sink = Some(sink);
        self
    }

    pub fn session(&self) -> &RecognitionSession {
        &self.session
    }

    /// Recognize every task of `batch` against `frame`
    ///
    /// A single task yields [`BatchOutput::Single`], a list yields
    /// [`BatchOutput::Many`] in input order.
    pub fn recognize(
        &mut self,
        frame: &CapturedFrame,
        batch: impl Into<TaskBatch>,
    ) -> Result<BatchOutput, OcrError> {
        let batch = batch.into();
        let span = info_span!("batch", id = %Uuid::new_v4());
        let _enter = span.enter();

        let tasks = batch.tasks();
        let languages = tasks
            .first()
            .and_then(|task| task.languages.clone())
            .filter(|languages| !languages.is_empty())
            .unwrap_or_else(|| self.default_languages.clone());

        if self.session.languages().is_some_and(|current| current != &languages) {
            info!("Language set changed to [{}]; rebuilding session", languages);
            self.session.terminate();
        }
        self.session.ensure(&languages)?;

        if tasks.is_empty() {
            return Ok(batch.shape(Vec::new()));
        }

        let working = preprocess(frame.image(), &self.preprocessing)?;
        if let Some(sink) = &self.diagnostic_sink {
            sink(&working);
        }

        info!(
            "Running {} task(s) on {}x{} working image",
            tasks.len(),
            working.width(),
            working.height()
        );

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            if index > 0 && task.languages.as_ref().is_some_and(|l| l != &languages) {
                warn!("Task {} languages ignored; session is bound to [{}]", index, languages);
            }

            let outcome = match self.run_task(frame, &working, task) {
                Ok(text) => {
                    debug!("Task {} recognized {} chars", index, text.chars().count());
                    TaskOutcome::Recognized(text)
                }
                Err(err) if err.aborts_batch() => return Err(err),
                Err(err) => {
                    warn!("Task {} failed: {}", index, err);
                    TaskOutcome::Failed(err)
                }
            };
            outcomes.push(outcome);
        }

        Ok(batch.shape(outcomes))
    }

    /// Release the engine; the next batch builds a new one
    pub fn terminate(&mut self) {
        self.session.terminate();
    }

    fn run_task(
        &mut self,
        frame: &CapturedFrame,
        working: &WorkingImage,
        task: &RecognitionTask,
    ) -> Result<String, OcrError> {
        self.session
            .apply(task.segmentation_mode, task.parameters.as_ref())?;

        let region = match task.region {
            Some(rect) => map_rect(rect, frame.viewport(), frame.capture_size(), working.scale())?,
            None => full_working_rect(frame.capture_size(), working.scale()),
        };
        if region.is_empty() {
            return Err(OcrError::InvalidRegion("selection has no area".to_string()));
        }

        let raw = self.session.recognize(working, region)?;
        Ok(post_process(&raw, task.segmentation_mode))
    }
}
