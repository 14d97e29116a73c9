use std::path::PathBuf;

/// Crate-level constants
pub const CRATE_NAME: &str = "labextract";
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tesseract traineddata directory.
/// `LABEXTRACT_TESSDATA_DIR` overrides the common Linux install location.
pub fn tessdata_dir() -> PathBuf {
    std::env::var_os("LABEXTRACT_TESSDATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/usr/share/tesseract-ocr/5/tessdata"))
}

/// OCR language string. Combined Cyrillic+Latin recognition by default.
pub fn ocr_languages() -> String {
    std::env::var("LABEXTRACT_OCR_LANGS").unwrap_or_else(|_| "rus+eng".to_string())
}

/// Optional external analyte lexicon for the entity recognizer.
/// Unset means the bundled lexicon is used.
pub fn lexicon_path() -> Option<PathBuf> {
    std::env::var_os("LABEXTRACT_LEXICON").map(PathBuf::from)
}

/// Whether the normalizer persists the preprocessed raster next to the input
/// for diagnostic inspection. On unless `LABEXTRACT_DIAGNOSTICS=0`.
pub fn diagnostics_enabled() -> bool {
    std::env::var("LABEXTRACT_DIAGNOSTICS").map_or(true, |v| v != "0")
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,labextract=debug"
}
