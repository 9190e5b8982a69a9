//! Reusable recognition session
//!
//! Owns one engine bound to a fixed language set. The engine is created on
//! first use, reused across batches, and released only by [`terminate`].
//! Parameters applied for one task stay in effect for the next.
//!
//! [`terminate`]: RecognitionSession::terminate

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::geometry::{Rect, WorkingSpace};
use crate::vision::engine::{EngineFactory, EngineParameters, LanguageSet, RecognitionEngine, SegmentationMode};
use crate::vision::WorkingImage;

enum SessionState {
    Absent,
    Ready(ReadySession),
}

struct ReadySession {
    languages: LanguageSet,
    engine: Box<dyn RecognitionEngine>,
    applied: EngineParameters,
}

/// Lazily created, language-bound engine session
pub struct RecognitionSession {
    factory: Arc<dyn EngineFactory>,
    state: SessionState,
    initializations: usize,
}

impl RecognitionSession {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            state: SessionState::Absent,
            initializations: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Language set of the live engine, if any
    pub fn languages(&self) -> Option<&LanguageSet> {
        match &self.state {
            SessionState::Ready(ready) => Some(&ready.languages),
            SessionState::Absent => None,
        }
    }

    /// Parameters last applied to the live engine
    pub fn applied_parameters(&self) -> Option<&EngineParameters> {
        match &self.state {
            SessionState::Ready(ready) => Some(&ready.applied),
            SessionState::Absent => None,
        }
    }

    /// Number of engines built over this session's lifetime
    pub fn initializations(&self) -> usize {
        self.initializations
    }

    /// Make sure an engine for `languages` is ready
    ///
    /// Reuses the live engine when the languages match. A live engine bound
    /// to other languages is refused; terminate the session first.
    pub fn ensure(&mut self, languages: &LanguageSet) -> Result<(), OcrError> {
        if let SessionState::Ready(ready) = &self.state {
            if &ready.languages == languages {
                return Ok(());
            }
            return Err(OcrError::SessionInitFailure {
                languages: languages.to_string(),
                reason: format!("session is bound to [{}]; terminate it first", ready.languages),
            });
        }

        if languages.is_empty() {
            return Err(OcrError::SessionInitFailure {
                languages: String::new(),
                reason: "no languages requested".to_string(),
            });
        }

        info!("Creating recognition session for [{}]", languages);
        let engine = self.factory.create(languages).map_err(|e| OcrError::SessionInitFailure {
            languages: languages.to_string(),
            reason: format!("{:#}", e),
        })?;

        self.initializations += 1;
        self.state = SessionState::Ready(ReadySession {
            languages: languages.clone(),
            engine,
            applied: EngineParameters::default(),
        });
        Ok(())
    }

    /// Layer a task's mode and overrides onto the applied parameters
    ///
    /// The engine is only touched when something changes. Returns whether
    /// new parameters were applied.
    pub fn apply(
        &mut self,
        segmentation_mode: Option<SegmentationMode>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> Result<bool, OcrError> {
        let ready = self.ready_mut()?;
        let merged = ready.applied.merged_with(segmentation_mode, overrides);
        if merged == ready.applied {
            return Ok(false);
        }

        ready
            .engine
            .set_parameters(&merged)
            .map_err(|e| OcrError::RecognitionFailure(format!("could not apply parameters: {:#}", e)))?;
        debug!("Applied engine parameters: {:?}", merged);
        ready.applied = merged;
        Ok(true)
    }

    /// Recognize text inside a working-space region
    pub fn recognize(&mut self, image: &WorkingImage, region: Rect<WorkingSpace>) -> Result<String, OcrError> {
        let region = region.clamp_to(image.size())?.to_pixel_region();
        let ready = self.ready_mut()?;
        ready
            .engine
            .recognize(image, region)
            .map_err(|e| OcrError::RecognitionFailure(format!("{:#}", e)))
    }

    /// Release the engine. Safe to call when no engine exists.
    pub fn terminate(&mut self) {
        if let SessionState::Ready(ready) = std::mem::replace(&mut self.state, SessionState::Absent) {
            info!("Terminating recognition session for [{}]", ready.languages);
        }
    }

    fn ready_mut(&mut self) -> Result<&mut ReadySession, OcrError> {
        match &mut self.state {
            SessionState::Ready(ready) => Ok(ready),
            SessionState::Absent => Err(OcrError::RecognitionFailure(
                "no recognition session is active".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessingConfig;
    use crate::geometry::PixelRegion;
    use crate::vision::engine::testing::FakeFactory;
    use crate::vision::preprocess;
    use image::{Rgba, RgbaImage};

    fn languages(codes: &[&str]) -> LanguageSet {
        codes.iter().copied().collect()
    }

    fn working_image() -> WorkingImage {
        let image = RgbaImage::from_pixel(50, 40, Rgba([220, 220, 220, 255]));
        preprocess(&image, &PreprocessingConfig::default()).unwrap()
    }

    #[test]
    fn test_ensure_reuses_session() {
        let factory = FakeFactory::default();
        let mut session = RecognitionSession::new(Arc::new(factory.clone()));
        assert!(!session.is_ready());

        session.ensure(&languages(&["eng"])).unwrap();
        session.ensure(&languages(&["eng"])).unwrap();

        assert!(session.is_ready());
        assert_eq!(session.initializations(), 1);
        assert_eq!(factory.initializations(), 1);
    }

    #[test]
    fn test_ensure_refuses_other_languages() {
        let mut session = RecognitionSession::new(Arc::new(FakeFactory::default()));
        session.ensure(&languages(&["eng"])).unwrap();

        let err = session.ensure(&languages(&["jpn"])).unwrap_err();
        assert!(matches!(err, OcrError::SessionInitFailure { .. }));
        assert_eq!(session.languages(), Some(&languages(&["eng"])));
    }

    #[test]
    fn test_terminate_then_recreate() {
        let factory = FakeFactory::default();
        let mut session = RecognitionSession::new(Arc::new(factory.clone()));

        session.terminate();
        session.ensure(&languages(&["eng"])).unwrap();
        session.terminate();
        session.terminate();
        assert!(!session.is_ready());

        session.ensure(&languages(&["jpn"])).unwrap();
        assert_eq!(factory.initializations(), 2);
        assert_eq!(session.languages(), Some(&languages(&["jpn"])));
    }

    #[test]
    fn test_factory_failure_is_session_init_failure() {
        let mut session = RecognitionSession::new(Arc::new(FakeFactory::failing()));
        let err = session.ensure(&languages(&["klingon"])).unwrap_err();
        match err {
            OcrError::SessionInitFailure { languages, reason } => {
                assert_eq!(languages, "klingon");
                assert!(reason.contains("not installed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!session.is_ready());
    }

    #[test]
    fn test_empty_language_set_is_refused() {
        let factory = FakeFactory::default();
        let mut session = RecognitionSession::new(Arc::new(factory.clone()));
        let err = session.ensure(&LanguageSet::from(Vec::new())).unwrap_err();
        assert!(matches!(err, OcrError::SessionInitFailure { .. }));
        assert_eq!(factory.initializations(), 0);
    }

    #[test]
    fn test_apply_only_when_changed() {
        let mut session = RecognitionSession::new(Arc::new(FakeFactory::default()));
        session.ensure(&languages(&["eng"])).unwrap();

        assert!(session.apply(Some(SegmentationMode::SingleLine), None).unwrap());
        assert!(!session.apply(Some(SegmentationMode::SingleLine), None).unwrap());
        assert!(!session.apply(None, None).unwrap());
        assert_eq!(
            session.applied_parameters().and_then(|p| p.segmentation_mode),
            Some(SegmentationMode::SingleLine)
        );
    }

    #[test]
    fn test_recognize_without_session_fails() {
        let mut session = RecognitionSession::new(Arc::new(FakeFactory::default()));
        let image = working_image();
        let err = session.recognize(&image, Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap_err();
        assert!(matches!(err, OcrError::RecognitionFailure(_)));
    }

    #[test]
    fn test_recognize_clamps_region() {
        let factory = FakeFactory::default();
        let mut session = RecognitionSession::new(Arc::new(factory.clone()));
        session.ensure(&languages(&["eng"])).unwrap();

        let image = working_image();
        let text = session.recognize(&image, Rect::new(90.0, 70.0, 30.0, 30.0)).unwrap();

        assert_eq!(text, "10x10");
        assert_eq!(
            factory.calls()[0].region,
            PixelRegion { x: 90, y: 70, width: 10, height: 10 }
        );
    }

    #[test]
    fn test_engine_error_is_recognition_failure() {
        let factory = FakeFactory::replying([Err("engine crashed")]);
        let mut session = RecognitionSession::new(Arc::new(factory));
        session.ensure(&languages(&["eng"])).unwrap();

        let image = working_image();
        let err = session.recognize(&image, Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap_err();
        assert_eq!(err, OcrError::RecognitionFailure("engine crashed".to_string()));
        assert!(session.is_ready());
    }
}
