//! labextract — turns scanned or photographed laboratory reports into
//! structured biomarker records.
//!
//! The pipeline runs three stages per document, each a pure function of its
//! input: image normalization ([`pipeline::preprocess`]), OCR with a
//! degraded-input fallback ([`pipeline::ocr`]), and bilingual Cyrillic/Latin
//! pattern-and-entity extraction ([`pipeline::engine`]). The only artifact
//! that crosses the crate boundary is [`pipeline::ExtractionResult`].
//!
//! HTTP handlers, upload validation, and persistence are external
//! collaborators; [`pipeline::DocumentPipeline`] is the surface they call.

pub mod config;
pub mod pipeline;

pub use pipeline::{
    BiomarkerKey, BiomarkerMeasurement, DocumentPipeline, ExtractionResult, PatientInfo,
    PipelineError, RecognizedText,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
