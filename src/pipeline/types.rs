use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::PipelineError;

/// Monochrome raster produced by the normalizer.
///
/// Owned exclusively by the pipeline call that produced it; each transform
/// stage replaces it rather than mutating in place.
#[derive(Debug, Clone)]
pub struct RasterDocument {
    pixels: GrayImage,
}

impl RasterDocument {
    pub fn new(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> GrayImage {
        self.pixels
    }

    /// Polarity-inverted copy, for the white-on-black OCR retry.
    pub fn inverted(&self) -> Self {
        let mut pixels = self.pixels.clone();
        image::imageops::colorops::invert(&mut pixels);
        Self { pixels }
    }
}

/// Text recovered from exactly one [`RasterDocument`].
///
/// `lines` preserve document order. `tokens` are populated only by the
/// layout-aware recognizer variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizedText {
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<OcrToken>,
}

impl RecognizedText {
    pub fn from_plain(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            tokens: Vec::new(),
        }
    }

    /// True when no line carries anything but whitespace.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    pub fn full_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// One recognized token with engine geometry and confidence (0–100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    pub word: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Canonical identifier for a measured lab quantity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerKey {
    TotalCholesterol,
    LdlC,
    HdlC,
    Triglycerides,
    Creatinine,
    Urea,
    UricAcid,
    Alt,
    Ast,
    Crp,
    TotalBilirubin,
    Potassium,
    Sodium,
    Glucose,
    GlycatedHemoglobin,
    Tsh,
    T4,
}

impl BiomarkerKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalCholesterol => "total_cholesterol",
            Self::LdlC => "ldl_c",
            Self::HdlC => "hdl_c",
            Self::Triglycerides => "triglycerides",
            Self::Creatinine => "creatinine",
            Self::Urea => "urea",
            Self::UricAcid => "uric_acid",
            Self::Alt => "alt",
            Self::Ast => "ast",
            Self::Crp => "crp",
            Self::TotalBilirubin => "total_bilirubin",
            Self::Potassium => "potassium",
            Self::Sodium => "sodium",
            Self::Glucose => "glucose",
            Self::GlycatedHemoglobin => "glycated_hemoglobin",
            Self::Tsh => "tsh",
            Self::T4 => "t4",
        }
    }
}

impl fmt::Display for BiomarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted measurement.
///
/// Invariant: when both range bounds are present,
/// `is_abnormal = value < reference_min || value > reference_max`;
/// otherwise `is_abnormal` stays `None` (unknown, not false).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerMeasurement {
    pub name: BiomarkerKey,
    pub value: f64,
    pub unit: Option<String>,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub is_abnormal: Option<bool>,
}

/// Patient identity fields. Absence means "not found", not "empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub patronymic: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub record_number: Option<String>,
}

/// The one artifact that crosses the core/persistence boundary.
///
/// Keys are unique: once a biomarker is resolved, a later-found value for
/// the same key never overwrites it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub biomarkers: BTreeMap<BiomarkerKey, BiomarkerMeasurement>,
    pub study_date: Option<NaiveDate>,
    pub patient: PatientInfo,
}

/// OCR engine abstraction (allows mocking for tests).
///
/// `recognize_tsv` returns Tesseract-style TSV with per-word geometry:
/// `level page_num block_num par_num line_num word_num left top width height conf text`.
pub trait OcrEngine: Send + Sync {
    fn recognize_text(&self, png_bytes: &[u8]) -> Result<String, PipelineError>;

    fn recognize_tsv(&self, png_bytes: &[u8]) -> Result<String, PipelineError>;
}
