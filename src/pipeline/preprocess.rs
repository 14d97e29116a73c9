//! Image normalizer: arbitrary scan or photo in, clean monochrome raster out.
//!
//! Fixed transform order. Every step is unconditional except upscaling and
//! deskew, which are gated on measured properties of the image:
//!
//! decode → enhance → upscale → binarize → denoise → deskew → sharpen →
//! thicken → diagnostic save.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::adaptive_threshold;
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::morphology::erode;
use imageproc::point::Point;
use tracing::{debug, warn};

use crate::config;

use super::types::{BoundingBox, RasterDocument};
use super::{pdf, PipelineError};

/// Images whose shorter side is below this are upscaled before OCR.
const MIN_WORKING_DIMENSION: u32 = 1800;
/// Skew below this magnitude (degrees) is left alone.
const DESKEW_THRESHOLD_DEGREES: f32 = 0.5;
/// Neighborhood radius for adaptive binarization (11x11 window).
const ADAPTIVE_BLOCK_RADIUS: u32 = 5;
/// Contours smaller than this (px²) are never table candidates.
const MIN_TABLE_AREA: f64 = 5000.0;

const CONTRAST_FACTOR: f32 = 1.5;
const BRIGHTNESS_FACTOR: f32 = 1.1;
const UNSHARP_SIGMA: f32 = 2.0;
const UNSHARP_THRESHOLD: i32 = 3;
/// Edge-replication pad for the enhancement kernel passes; must cover the
/// unsharp mask's blur radius plus the kernel pass's unprocessed edge ring.
const ENHANCE_PAD: u32 = 12;

/// Denoise filter strength and window geometry.
const NLM_STRENGTH: f32 = 10.0;
const NLM_PATCH_RADIUS: i64 = 1;
const NLM_SEARCH_RADIUS: i64 = 5;

/// Gentle pre-binarization sharpen; kernel sums to 1.
const MILD_SHARPEN_KERNEL: [f32; 9] = [0.0, -0.5, 0.0, -0.5, 3.0, -0.5, 0.0, -0.5, 0.0];
/// Final text sharpen; kernel sums to 1.
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Run the full normalization sequence over one input file.
pub fn normalize(path: &Path) -> Result<RasterDocument, PipelineError> {
    let gray = decode(path)?.to_luma8();

    let enhanced = enhance(&gray);
    let upscaled = upscale_if_small(enhanced);
    let binary = adaptive_threshold(&upscaled, ADAPTIVE_BLOCK_RADIUS);
    let denoised = denoise(&binary);
    let straightened = deskew(denoised);
    let finished = thicken_strokes(&sharpen(&straightened));

    persist_diagnostic(&finished, path);

    debug!(
        path = %path.display(),
        width = finished.width(),
        height = finished.height(),
        "normalization complete"
    );
    Ok(RasterDocument::new(finished))
}

/// Decode the input: PDFs are rasterized at their first page, everything
/// else must open as an image.
fn decode(path: &Path) -> Result<DynamicImage, PipelineError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return pdf::rasterize_first_page(path);
    }
    image::open(path).map_err(|e| PipelineError::UnreadableInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Scale up uniformly until the shorter side reaches the working minimum.
/// Larger inputs pass through untouched.
fn upscale_if_small(img: GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let shorter = width.min(height);
    if shorter == 0 || shorter >= MIN_WORKING_DIMENSION {
        return img;
    }
    let scale = MIN_WORKING_DIMENSION as f32 / shorter as f32;
    let new_width = (width as f32 * scale).round() as u32;
    let new_height = (height as f32 * scale).round() as u32;
    debug!(from = shorter, to = MIN_WORKING_DIMENSION, "upscaling low-resolution input");
    imageops::resize(&img, new_width, new_height, FilterType::CatmullRom)
}

/// Contrast stretch around mid-gray, mild brightness lift, then a two-stage
/// sharpen (kernel pass plus unsharp mask). The kernel passes run over an
/// edge-replicated padding and the result is cropped back: without the pad
/// they darken border pixels of even a blank page, and binarization turns
/// that into a black frame around every document.
fn enhance(gray: &GrayImage) -> GrayImage {
    let adjusted = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0] as f32;
        let stretched = (v - 128.0) * CONTRAST_FACTOR + 128.0;
        Luma([(stretched * BRIGHTNESS_FACTOR).clamp(0.0, 255.0) as u8])
    });
    let padded = replicate_pad(&adjusted, ENHANCE_PAD);
    let sharpened = imageops::filter3x3(&padded, &MILD_SHARPEN_KERNEL);
    let masked = imageops::unsharpen(&sharpened, UNSHARP_SIGMA, UNSHARP_THRESHOLD);
    crop_center(&masked, ENHANCE_PAD, gray.width(), gray.height())
}

/// Extend an image by `pad` pixels on every side, replicating edge pixels.
fn replicate_pad(img: &GrayImage, pad: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
        let sx = x.saturating_sub(pad).min(width - 1);
        let sy = y.saturating_sub(pad).min(height - 1);
        *img.get_pixel(sx, sy)
    })
}

fn crop_center(img: &GrayImage, pad: u32, width: u32, height: u32) -> GrayImage {
    img.view(pad, pad, width, height).to_image()
}

/// Salt-and-pepper removal followed by patch-based smoothing.
fn denoise(img: &GrayImage) -> GrayImage {
    let despeckled = median_filter(img, 1, 1);
    non_local_means(&despeckled, NLM_STRENGTH)
}

/// Patch-similarity weighted average. Pixels whose immediate neighborhood is
/// already uniform are copied through, which makes clean regions cheap.
fn non_local_means(img: &GrayImage, strength: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let h2 = strength * strength;
    GrayImage::from_fn(width, height, |x, y| {
        if uniform_neighborhood(img, x as i64, y as i64) {
            return *img.get_pixel(x, y);
        }
        let mut weighted = 0.0f32;
        let mut weight_sum = 0.0f32;
        for ny in (y as i64 - NLM_SEARCH_RADIUS)..=(y as i64 + NLM_SEARCH_RADIUS) {
            for nx in (x as i64 - NLM_SEARCH_RADIUS)..=(x as i64 + NLM_SEARCH_RADIUS) {
                let dist = patch_distance(img, x as i64, y as i64, nx, ny);
                let weight = (-dist / h2).exp();
                weighted += weight * clamped_pixel(img, nx, ny) as f32;
                weight_sum += weight;
            }
        }
        Luma([(weighted / weight_sum).round().clamp(0.0, 255.0) as u8])
    })
}

fn clamped_pixel(img: &GrayImage, x: i64, y: i64) -> u8 {
    let cx = x.clamp(0, img.width() as i64 - 1) as u32;
    let cy = y.clamp(0, img.height() as i64 - 1) as u32;
    img.get_pixel(cx, cy).0[0]
}

fn uniform_neighborhood(img: &GrayImage, x: i64, y: i64) -> bool {
    let center = clamped_pixel(img, x, y);
    for dy in -1..=1 {
        for dx in -1..=1 {
            if clamped_pixel(img, x + dx, y + dy) != center {
                return false;
            }
        }
    }
    true
}

/// Mean squared difference between the patches centered at the two points.
fn patch_distance(img: &GrayImage, ax: i64, ay: i64, bx: i64, by: i64) -> f32 {
    let mut sum = 0.0f32;
    for dy in -NLM_PATCH_RADIUS..=NLM_PATCH_RADIUS {
        for dx in -NLM_PATCH_RADIUS..=NLM_PATCH_RADIUS {
            let a = clamped_pixel(img, ax + dx, ay + dy) as f32;
            let b = clamped_pixel(img, bx + dx, by + dy) as f32;
            sum += (a - b) * (a - b);
        }
    }
    let side = (2 * NLM_PATCH_RADIUS + 1) as f32;
    sum / (side * side)
}

/// Estimated page skew in degrees, from the minimum-area rectangle around
/// the largest dark region. Zero when the page carries no contours.
pub(crate) fn compute_skew_angle(img: &GrayImage) -> f32 {
    let mut inverted = img.clone();
    imageops::colorops::invert(&mut inverted);

    let contours = find_contours::<i32>(&inverted);
    let Some(largest) = contours.iter().max_by(|a, b| {
        contour_area(&a.points)
            .partial_cmp(&contour_area(&b.points))
            .unwrap_or(std::cmp::Ordering::Equal)
    }) else {
        return 0.0;
    };
    if largest.points.len() < 3 {
        return 0.0;
    }
    rect_angle(&min_area_rect(&largest.points))
}

/// Orientation of the rectangle's longer edge, folded into (-45°, 45°].
fn rect_angle(rect: &[Point<i32>; 4]) -> f32 {
    let edge = |a: Point<i32>, b: Point<i32>| {
        let dx = (b.x - a.x) as f32;
        let dy = (b.y - a.y) as f32;
        (dx * dx + dy * dy, dy.atan2(dx).to_degrees())
    };
    let (len_a, angle_a) = edge(rect[0], rect[1]);
    let (len_b, angle_b) = edge(rect[1], rect[2]);
    let mut angle = if len_a >= len_b { angle_a } else { angle_b };
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}

/// Shoelace area over a closed contour.
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        doubled += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    doubled.unsigned_abs() as f64 / 2.0
}

/// Rotate the page upright when measured skew exceeds the threshold.
fn deskew(img: GrayImage) -> GrayImage {
    let angle = compute_skew_angle(&img);
    if angle.abs() <= DESKEW_THRESHOLD_DEGREES {
        return img;
    }
    debug!(degrees = angle, "correcting page skew");
    rotate_about_center(
        &img,
        (-angle).to_radians(),
        Interpolation::Bicubic,
        Luma([255u8]),
    )
}

fn sharpen(img: &GrayImage) -> GrayImage {
    let padded = replicate_pad(img, 1);
    let sharpened = imageops::filter3x3(&padded, &SHARPEN_KERNEL);
    crop_center(&sharpened, 1, img.width(), img.height())
}

/// Eroding the white background by one pixel fattens dark glyph strokes.
fn thicken_strokes(img: &GrayImage) -> GrayImage {
    erode(img, Norm::LInf, 1)
}

/// Best-effort save of the finished raster next to the input. Failures are
/// logged, never propagated.
fn persist_diagnostic(img: &GrayImage, input: &Path) {
    if !config::diagnostics_enabled() {
        return;
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    let target = input.with_file_name(format!("preprocessed_{stem}.png"));
    match img.save(&target) {
        Ok(()) => debug!(path = %target.display(), "diagnostic raster written"),
        Err(e) => warn!(path = %target.display(), error = %e, "diagnostic raster not written"),
    }
}

/// Horizontal page band, by report layout convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentZone {
    /// Top 20%: clinic letterhead, patient identity, dates.
    Header,
    /// Middle 60%: the results table.
    Body,
    /// Bottom 20%: physician notes and signatures.
    Footer,
}

/// Crop one layout band out of a normalized raster.
pub fn extract_zone(doc: &RasterDocument, zone: DocumentZone) -> RasterDocument {
    let (width, height) = (doc.width(), doc.height());
    let band = height / 5;
    let (y, zone_height) = match zone {
        DocumentZone::Header => (0, band),
        DocumentZone::Body => (band, height.saturating_sub(2 * band)),
        DocumentZone::Footer => (height.saturating_sub(band), band),
    };
    RasterDocument::new(doc.pixels().view(0, y, width, zone_height).to_image())
}

/// Bounding boxes of table-sized dark regions: large enough to be a results
/// grid, with a plausible width-to-height ratio. Order is unspecified.
pub fn detect_table_areas(doc: &RasterDocument) -> Vec<BoundingBox> {
    let mut inverted = doc.pixels().clone();
    imageops::colorops::invert(&mut inverted);

    find_contours::<i32>(&inverted)
        .iter()
        .filter_map(|contour| {
            if contour_area(&contour.points) <= MIN_TABLE_AREA {
                return None;
            }
            let bbox = points_bounding_box(&contour.points)?;
            if bbox.height == 0 {
                return None;
            }
            let aspect = bbox.width as f32 / bbox.height as f32;
            (0.5..=5.0).contains(&aspect).then_some(bbox)
        })
        .collect()
}

fn points_bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(BoundingBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x).max(0) as u32 + 1,
        height: (max_y - min_y).max(0) as u32 + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::rect::Rect;

    fn white(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255u8]))
    }

    fn with_black_rect(width: u32, height: u32, rect: Rect) -> GrayImage {
        let mut img = white(width, height);
        imageproc::drawing::draw_filled_rect_mut(&mut img, rect, Luma([0u8]));
        img
    }

    #[test]
    fn normalize_upscales_small_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        white(64, 48).save(&path).unwrap();

        let raster = normalize(&path).unwrap();
        assert!(raster.width().min(raster.height()) >= MIN_WORKING_DIMENSION);
        // Aspect ratio preserved: 64x48 scales to 2400x1800
        assert_eq!(raster.width(), 2400);
        assert_eq!(raster.height(), 1800);
    }

    #[test]
    fn normalize_writes_diagnostic_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        white(64, 64).save(&path).unwrap();

        normalize(&path).unwrap();
        assert!(dir.path().join("preprocessed_scan.png").exists());
    }

    #[test]
    fn normalize_rejects_missing_file() {
        let err = normalize(Path::new("/nonexistent/report.png")).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableInput { .. }));
    }

    #[test]
    fn normalize_rejects_non_image_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"this is not an image").unwrap();

        let err = normalize(&path).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableInput { .. }));
    }

    #[test]
    fn upscale_leaves_large_inputs_untouched() {
        let out = upscale_if_small(white(2000, 1900));
        assert_eq!((out.width(), out.height()), (2000, 1900));
    }

    #[test]
    fn blank_page_has_no_skew() {
        assert_eq!(compute_skew_angle(&white(200, 200)), 0.0);
    }

    #[test]
    fn axis_aligned_content_has_negligible_skew() {
        let img = with_black_rect(200, 200, Rect::at(40, 60).of_size(120, 40));
        assert!(compute_skew_angle(&img).abs() < DESKEW_THRESHOLD_DEGREES);
    }

    #[test]
    fn deskew_straightens_rotated_content() {
        // 160x40 rectangle centered at (150, 150), rotated by 5 degrees
        let mut img = white(300, 300);
        let theta = 5.0f32.to_radians();
        let (cx, cy) = (150.0f32, 150.0f32);
        let corners: Vec<Point<i32>> = [(-80.0, -20.0), (80.0, -20.0), (80.0, 20.0), (-80.0, 20.0)]
            .iter()
            .map(|(x, y): &(f32, f32)| {
                let rx = x * theta.cos() - y * theta.sin() + cx;
                let ry = x * theta.sin() + y * theta.cos() + cy;
                Point::new(rx.round() as i32, ry.round() as i32)
            })
            .collect();
        draw_polygon_mut(&mut img, &corners, Luma([0u8]));

        let measured = compute_skew_angle(&img);
        assert!(
            (measured.abs() - 5.0).abs() < 1.5,
            "expected ~5 degrees, measured {measured}"
        );

        let straightened = deskew(img);
        let residual = compute_skew_angle(&straightened);
        assert!(residual.abs() < 1.5, "residual skew {residual}");
    }

    #[test]
    fn enhancement_leaves_blank_borders_white() {
        let out = enhance(&white(32, 32));
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn uniform_page_survives_full_transform_chain() {
        // Every stage must tolerate a contentless page
        let enhanced = enhance(&white(32, 32));
        let binary = adaptive_threshold(&enhanced, ADAPTIVE_BLOCK_RADIUS);
        let denoised = denoise(&binary);
        let finished = thicken_strokes(&sharpen(&deskew(denoised)));
        assert_eq!((finished.width(), finished.height()), (32, 32));
        assert!(finished.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn zones_split_twenty_sixty_twenty() {
        let doc = RasterDocument::new(white(90, 100));
        let header = extract_zone(&doc, DocumentZone::Header);
        let body = extract_zone(&doc, DocumentZone::Body);
        let footer = extract_zone(&doc, DocumentZone::Footer);

        assert_eq!((header.width(), header.height()), (90, 20));
        assert_eq!((body.width(), body.height()), (90, 60));
        assert_eq!((footer.width(), footer.height()), (90, 20));
    }

    #[test]
    fn table_detection_finds_large_plausible_regions() {
        let doc = RasterDocument::new(with_black_rect(
            300,
            300,
            Rect::at(50, 50).of_size(120, 60),
        ));
        let areas = detect_table_areas(&doc);
        assert_eq!(areas.len(), 1);
        let bbox = &areas[0];
        assert!((48..=52).contains(&bbox.x), "x {}", bbox.x);
        assert!((48..=52).contains(&bbox.y), "y {}", bbox.y);
        assert!((118..=122).contains(&bbox.width), "width {}", bbox.width);
        assert!((58..=62).contains(&bbox.height), "height {}", bbox.height);
    }

    #[test]
    fn table_detection_aspect_bounds_are_inclusive() {
        // 300x60 region sits exactly on the 5:1 upper bound
        let doc = RasterDocument::new(with_black_rect(
            400,
            300,
            Rect::at(20, 20).of_size(300, 60),
        ));
        let areas = detect_table_areas(&doc);
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].width, 300);
        assert_eq!(areas[0].height, 60);
    }

    #[test]
    fn table_detection_ignores_small_and_skinny_regions() {
        // Small blob: under the area floor
        let small = RasterDocument::new(with_black_rect(300, 300, Rect::at(10, 10).of_size(30, 30)));
        assert!(detect_table_areas(&small).is_empty());

        // Long rule line: large area but implausible aspect ratio
        let skinny =
            RasterDocument::new(with_black_rect(800, 300, Rect::at(10, 100).of_size(700, 10)));
        assert!(detect_table_areas(&skinny).is_empty());
    }

    #[test]
    fn non_local_means_preserves_uniform_regions() {
        let img = white(16, 16);
        let out = non_local_means(&img, NLM_STRENGTH);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn denoise_removes_isolated_speck() {
        let mut img = white(16, 16);
        img.put_pixel(8, 8, Luma([0u8]));
        let out = denoise(&img);
        assert_eq!(out.get_pixel(8, 8).0[0], 255);
    }
}
