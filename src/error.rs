//! Error taxonomy for the recognition core
//!
//! Batch-level failures abort a whole `recognize` call. Task-level failures
//! are reported in the failing task's slot while the rest of the batch runs.

use thiserror::Error;

/// Errors produced by preprocessing, mapping and recognition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    /// No drawable raster surface could be created from the supplied pixels
    #[error("no raster surface available: {0}")]
    SurfaceUnavailable(String),

    /// Input bytes are not a valid image
    #[error("image could not be decoded: {0}")]
    DecodeFailure(String),

    /// Engine could not be established for the requested languages
    #[error("recognition session could not be created for [{languages}]: {reason}")]
    SessionInitFailure { languages: String, reason: String },

    /// Engine call failed for a specific task
    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    /// Mapped rectangle lies outside the image or has no area
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Background worker has exited and can no longer accept batches
    #[error("recognition service has stopped")]
    ServiceStopped,
}

impl OcrError {
    /// Whether this error aborts the whole batch rather than a single task
    pub fn aborts_batch(&self) -> bool {
        !matches!(self, OcrError::RecognitionFailure(_) | OcrError::InvalidRegion(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_scoped_errors() {
        assert!(!OcrError::RecognitionFailure("x".into()).aborts_batch());
        assert!(!OcrError::InvalidRegion("x".into()).aborts_batch());
        assert!(OcrError::DecodeFailure("x".into()).aborts_batch());
        assert!(OcrError::SurfaceUnavailable("x".into()).aborts_batch());
        assert!(OcrError::ServiceStopped.aborts_batch());
    }

    #[test]
    fn test_session_error_message_names_languages() {
        let err = OcrError::SessionInitFailure {
            languages: "eng+jpn".to_string(),
            reason: "missing traineddata".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("eng+jpn"));
        assert!(msg.contains("missing traineddata"));
    }
}
