//! Vision/OCR Layer
//!
//! Turns a captured menu photo into text:
//! - `ocr_preprocess`: upscale and contrast normalization into a working image
//! - `engine` / `tesseract`: the recognition backend and its Tesseract binding
//! - `session`: one reusable, language-bound engine
//! - `orchestrator`: batches of region tasks against one frame
//! - `worker`: a background thread serializing batches for async callers

pub mod engine;
pub mod ocr_preprocess;
pub mod orchestrator;
pub mod session;
pub mod task;
pub mod tesseract;
pub mod worker;

pub use engine::SegmentationMode;
pub use ocr_preprocess::{preprocess, RasterImage, WorkingImage, DARK_BACKGROUND_THRESHOLD, UPSCALE_FACTOR};
pub use orchestrator::{DiagnosticSink, TaskOrchestrator};
pub use task::{BatchOutput, RecognitionTask, TaskBatch, TaskOutcome, CHAR_WHITELIST};
pub use tesseract::TesseractFactory;
pub use worker::RecognitionService;
