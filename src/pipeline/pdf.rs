//! First-page PDF rasterization through pdfium.
//!
//! Lab reports arrive as single-page scans wrapped in PDF far more often
//! than as multi-page documents, so only the first page is rendered.
//! The pdfium shared library is resolved at call time: an explicit
//! `PDFIUM_DYNAMIC_LIB_PATH` wins, then a library next to the executable,
//! then the system-wide install.

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use super::PipelineError;

/// Rendering resolution. Scans need headroom for the upscale-free path;
/// 400 dpi keeps 8pt table text legible after binarization.
const RENDER_DPI: f32 = 400.0;
const POINTS_PER_INCH: f32 = 72.0;
/// Hard cap on either rendered dimension, to bound memory on outsized pages.
const MAX_RENDER_DIMENSION: i32 = 6000;

/// Render the first page of the PDF at `path` as a grayscale-convertible
/// image. Every failure mode maps to [`PipelineError::UnreadableInput`].
pub fn rasterize_first_page(path: &Path) -> Result<DynamicImage, PipelineError> {
    let unreadable = |reason: String| PipelineError::UnreadableInput {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;

    let bindings = bind_pdfium().map_err(|e| unreadable(format!("pdfium unavailable: {e}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(&bytes, None)
        .map_err(|e| unreadable(format!("not a loadable PDF: {e}")))?;
    let page = document
        .pages()
        .first()
        .map_err(|e| unreadable(format!("no renderable page: {e}")))?;

    let (width, height) = render_dimensions(page.width().value, page.height().value);
    debug!(path = %path.display(), width, height, "rasterizing PDF first page");

    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_maximum_height(height);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| unreadable(format!("render failed: {e}")))?;

    Ok(bitmap.as_image())
}

fn bind_pdfium() -> Result<Box<dyn PdfiumLibraryBindings>, PdfiumError> {
    if let Some(explicit) = std::env::var_os("PDFIUM_DYNAMIC_LIB_PATH") {
        let library = std::path::PathBuf::from(explicit);
        return Pdfium::bind_to_library(&library);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let adjacent = Pdfium::pdfium_platform_library_name_at_path(&dir);
            if adjacent.exists() {
                return Pdfium::bind_to_library(&adjacent);
            }
        }
    }
    Pdfium::bind_to_system_library()
}

/// Pixel dimensions for a page measured in points, rendered at
/// [`RENDER_DPI`] and capped at [`MAX_RENDER_DIMENSION`] with the aspect
/// ratio preserved.
fn render_dimensions(width_points: f32, height_points: f32) -> (i32, i32) {
    let scale = RENDER_DPI / POINTS_PER_INCH;
    let mut width = (width_points * scale).round().max(1.0) as i32;
    let mut height = (height_points * scale).round().max(1.0) as i32;

    let longer = width.max(height);
    if longer > MAX_RENDER_DIMENSION {
        let shrink = MAX_RENDER_DIMENSION as f32 / longer as f32;
        width = ((width as f32 * shrink).round() as i32).max(1);
        height = ((height as f32 * shrink).round() as i32).max(1);
    }
    (width, height)
}
