//! Text recognition over normalized rasters.
//!
//! The engine itself sits behind [`OcrEngine`](super::types::OcrEngine) so
//! the retry and layout policies here are testable without a Tesseract
//! install. The real adapter is compiled in with the `ocr` feature.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat};
use tracing::debug;

use super::types::{BoundingBox, OcrEngine, OcrToken, RasterDocument, RecognizedText};
use super::PipelineError;

/// Words below this Tesseract confidence are dropped by the layout variant.
const CONFIDENCE_FLOOR: f32 = 60.0;

/// Recognize plain text, retrying once on the polarity-inverted raster when
/// the first pass comes back blank. White-on-black scan regions otherwise
/// read as empty pages.
///
/// Empty text after the retry is a valid result, not an error.
pub fn recognize(
    engine: &dyn OcrEngine,
    raster: &RasterDocument,
) -> Result<RecognizedText, PipelineError> {
    let text = engine.recognize_text(&encode_png(raster)?)?;
    if !text.trim().is_empty() {
        return Ok(RecognizedText::from_plain(&text));
    }

    debug!("empty OCR output, retrying with inverted polarity");
    let retried = engine.recognize_text(&encode_png(&raster.inverted())?)?;
    Ok(RecognizedText::from_plain(&retried))
}

/// Layout-aware variant: per-word geometry and confidence, with low-
/// confidence words removed. Lines are rebuilt from the surviving words.
pub fn recognize_with_layout(
    engine: &dyn OcrEngine,
    raster: &RasterDocument,
) -> Result<RecognizedText, PipelineError> {
    let tsv = engine.recognize_tsv(&encode_png(raster)?)?;
    let tokens: Vec<OcrToken> = parse_tsv(&tsv)
        .into_iter()
        .filter(|t| t.confidence >= CONFIDENCE_FLOOR)
        .collect();

    let lines = group_lines(&tokens);
    debug!(tokens = tokens.len(), lines = lines.len(), "layout recognition");
    Ok(RecognizedText { lines, tokens })
}

/// Block-grouped variant for tabular regions: one string per visual block,
/// lines within a block separated by newlines.
pub fn recognize_blocks(
    engine: &dyn OcrEngine,
    raster: &RasterDocument,
) -> Result<Vec<String>, PipelineError> {
    let tokens = parse_tsv(&engine.recognize_tsv(&encode_png(raster)?)?);

    let mut blocks: Vec<(u32, Vec<OcrToken>)> = Vec::new();
    for token in tokens {
        match blocks.last_mut() {
            Some((block, members)) if *block == token.block => members.push(token),
            _ => blocks.push((token.block, vec![token])),
        }
    }

    Ok(blocks
        .into_iter()
        .map(|(_, members)| group_lines(&members).join("\n"))
        .collect())
}

fn encode_png(raster: &RasterDocument) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(raster.pixels().clone())
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| PipelineError::Recognition(format!("raster encoding failed: {e}")))?;
    Ok(buf)
}

/// Parse Tesseract TSV output into word tokens. Only level-5 (word) rows
/// carry text; malformed rows are skipped rather than failing the document.
fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    tsv.lines().filter_map(parse_tsv_row).collect()
}

fn parse_tsv_row(row: &str) -> Option<OcrToken> {
    let cols: Vec<&str> = row.split('\t').collect();
    if cols.len() < 12 || cols[0] != "5" {
        return None;
    }
    let text = cols[11].trim();
    if text.is_empty() {
        return None;
    }

    let int = |i: usize| cols[i].parse::<u32>().ok();
    Some(OcrToken {
        text: text.to_string(),
        confidence: cols[10].parse().ok()?,
        bounding_box: Some(BoundingBox {
            x: int(6)?,
            y: int(7)?,
            width: int(8)?,
            height: int(9)?,
        }),
        block: int(2)?,
        paragraph: int(3)?,
        line: int(4)?,
        word: int(5)?,
    })
}

/// Rebuild text lines from word tokens, honoring the engine's block /
/// paragraph / line numbering. Token order is preserved as given.
fn group_lines(tokens: &[OcrToken]) -> Vec<String> {
    let mut lines: Vec<(u32, u32, u32, Vec<&str>)> = Vec::new();
    for token in tokens {
        let key = (token.block, token.paragraph, token.line);
        match lines.last_mut() {
            Some((b, p, l, words)) if (*b, *p, *l) == key => words.push(&token.text),
            _ => lines.push((key.0, key.1, key.2, vec![&token.text])),
        }
    }
    lines
        .into_iter()
        .map(|(_, _, _, words)| words.join(" "))
        .collect()
}

/// Tesseract-backed engine. Construction verifies that traineddata exists
/// for every configured language, so a broken install fails at startup
/// instead of on the first document.
#[cfg(feature = "ocr")]
pub struct TesseractRecognizer {
    tessdata: std::path::PathBuf,
    languages: String,
}

#[cfg(feature = "ocr")]
impl TesseractRecognizer {
    pub fn new() -> Result<Self, PipelineError> {
        let tessdata = crate::config::tessdata_dir();
        let languages = crate::config::ocr_languages();
        for lang in languages.split('+') {
            if !tessdata.join(format!("{lang}.traineddata")).exists() {
                return Err(PipelineError::TessdataNotFound(tessdata));
            }
        }
        Ok(Self { tessdata, languages })
    }

    fn session(&self, png_bytes: &[u8]) -> Result<tesseract::Tesseract, PipelineError> {
        let datapath = self.tessdata.to_string_lossy();
        tesseract::Tesseract::new(Some(datapath.as_ref()), Some(&self.languages))
            .map_err(|e| PipelineError::Recognition(e.to_string()))?
            .set_image_from_mem(png_bytes)
            .map_err(|e| PipelineError::Recognition(e.to_string()))
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractRecognizer {
    fn recognize_text(&self, png_bytes: &[u8]) -> Result<String, PipelineError> {
        self.session(png_bytes)?
            .get_text()
            .map_err(|e| PipelineError::Recognition(e.to_string()))
    }

    fn recognize_tsv(&self, png_bytes: &[u8]) -> Result<String, PipelineError> {
        self.session(png_bytes)?
            .get_tsv_text(0)
            .map_err(|e| PipelineError::Recognition(e.to_string()))
    }
}

/// Scripted engine for tests: queued responses, a failure switch, and a
/// call counter for asserting retry behavior.
pub struct MockOcrEngine {
    text_responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    tsv_responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    fail: bool,
    text_calls: std::sync::atomic::AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text_responses: Vec<&str>) -> Self {
        Self {
            text_responses: std::sync::Mutex::new(
                text_responses.into_iter().map(str::to_string).collect(),
            ),
            tsv_responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fail: false,
            text_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_tsv(self, tsv_responses: Vec<&str>) -> Self {
        *self.tsv_responses.lock().unwrap() =
            tsv_responses.into_iter().map(str::to_string).collect();
        self
    }

    pub fn failing() -> Self {
        let mut mock = Self::new(Vec::new());
        mock.fail = true;
        mock
    }

    /// Number of `recognize_text` invocations so far.
    pub fn text_call_count(&self) -> usize {
        self.text_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize_text(&self, _png_bytes: &[u8]) -> Result<String, PipelineError> {
        self.text_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Recognition("scripted failure".to_string()));
        }
        Ok(self
            .text_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn recognize_tsv(&self, _png_bytes: &[u8]) -> Result<String, PipelineError> {
        if self.fail {
            return Err(PipelineError::Recognition("scripted failure".to_string()));
        }
        Ok(self
            .tsv_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}
