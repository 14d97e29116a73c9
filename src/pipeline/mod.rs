//! Document-to-structured-data extraction pipeline.
//!
//! Control flow: file → [`preprocess`] → [`ocr`] → [`engine`] → result.
//! Each stage is a pure function of its input; independent documents can be
//! processed fully in parallel ([`batch`]).

pub mod batch;
pub mod catalog;
pub mod engine;
pub mod entities;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod types;

pub use batch::{process_batch, BatchSummary};
pub use engine::ExtractionEngine;
pub use entities::{Entity, EntityCategory, EntityRecognizer, LexiconEntityRecognizer};
pub use ocr::{recognize, recognize_blocks, recognize_with_layout, MockOcrEngine};
pub use types::{
    BiomarkerKey, BiomarkerMeasurement, BoundingBox, ExtractionResult, OcrEngine, OcrToken,
    PatientInfo, RasterDocument, RecognizedText,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Failures that prevent constructing a result object at all.
///
/// Soft misses (no date found, no biomarkers, no patient fields) are never
/// errors — they are unset fields in [`ExtractionResult`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input cannot be decoded as an image or as a renderable PDF page.
    /// Fatal for that document, never for a batch.
    #[error("unreadable input {path}: {reason}")]
    UnreadableInput { path: PathBuf, reason: String },

    /// OCR engine invocation itself failed. Empty output is not a failure.
    #[error("OCR engine failure: {0}")]
    Recognition(String),

    /// Tesseract traineddata directory missing or incomplete. Startup-fatal
    /// for the recognizer component.
    #[error("tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    /// Entity lexicon could not be loaded. Startup-fatal for the
    /// entity-assisted strategy only; line-pattern extraction still runs.
    #[error("entity model unavailable: {0}")]
    EntityModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two entry points the upload and persistence collaborators consume,
/// composed over shared engine handles.
///
/// Engine handles are initialized once and safe for concurrent read-only use;
/// the pipeline itself holds no per-document state.
pub struct DocumentPipeline {
    ocr: Arc<dyn OcrEngine>,
    engine: ExtractionEngine,
}

impl DocumentPipeline {
    /// Pipeline with line-pattern extraction only (no entity recognizer).
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            ocr,
            engine: ExtractionEngine::new(),
        }
    }

    /// Enable the entity-assisted biomarker strategy.
    pub fn with_entity_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.engine = self.engine.with_entity_recognizer(recognizer);
        self
    }

    /// Normalize the input file and run OCR over it.
    /// Empty recognized text is a valid result, not an error.
    pub fn normalize_and_recognize(&self, path: &Path) -> Result<RecognizedText, PipelineError> {
        let raster = preprocess::normalize(path)?;
        ocr::recognize(self.ocr.as_ref(), &raster)
    }

    /// Extract the structured record from recognized text. Never fails.
    pub fn extract(&self, text: &RecognizedText) -> ExtractionResult {
        self.engine.extract(text)
    }

    /// Full per-document run: normalize → recognize → extract.
    pub fn process(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        let text = self.normalize_and_recognize(path)?;
        Ok(self.extract(&text))
    }
}
