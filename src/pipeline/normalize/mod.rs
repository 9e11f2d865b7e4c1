//! Document Normalizer: bytes in, canonical grayscale page out.
//!
//! Pipeline flow:
//! 1. Size bounds + magic-byte format resolution
//! 2. Decode (image codecs, or the scan image of PDF page 1)
//! 3. EXIF orientation
//! 4. Grayscale + resample to the working resolution
//! 5. Deskew (projection profile), flagged low-confidence when unreliable
//! 6. Quality warnings
//! 7. Local contrast equalization

pub mod decode;
pub mod deskew;
pub mod enhance;
pub mod format;
pub mod pdf;
pub mod raster;

pub use raster::RasterDocument;

use image::imageops::FilterType;
use image::{GenericImageView, Luma, Rgb};
use thiserror::Error;
use tracing::debug;

use crate::config::NormalizerConfig;
use crate::error::EngineError;
use crate::models::{DeclaredFormat, NormalizationWarning};

use decode::decode_document;
use deskew::{estimate_skew, rotate_about_center};
use enhance::{assess_quality, equalize_local, histogram, otsu_threshold, rgb_to_gray};
use format::resolve_format;

/// A4 long edge in inches. Certificates are assumed to be A4 or Letter-sized.
pub const A4_LONG_EDGE_IN: f32 = 11.69;

/// Detected skew below this is left alone (degrees).
const MIN_CORRECTION_DEG: f32 = 0.1;

/// Paper-white used for pixels uncovered by rotation.
const PAPER: u8 = 255;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Input too small to be a document ({0} bytes)")]
    TooSmall(usize),

    #[error("Input of {size} bytes exceeds {limit_mb}MB limit")]
    TooLarge { size: usize, limit_mb: usize },

    #[error("Unsupported or unrecognized document format")]
    UnsupportedFormat,

    #[error("Image of {width}x{height} pixels exceeds the {limit} pixel limit")]
    TooManyPixels { width: u64, height: u64, limit: u64 },

    #[error("Image decoding failed: {0}")]
    Image(String),

    #[error("PDF processing failed: {0}")]
    Pdf(String),
}

impl From<NormalizeError> for EngineError {
    fn from(err: NormalizeError) -> Self {
        EngineError::Decode(err.to_string())
    }
}

/// Long edge of the working raster for a given DPI.
pub fn working_long_edge(working_dpi: f32) -> u32 {
    (working_dpi * A4_LONG_EDGE_IN).round().max(1.0) as u32
}

/// Scale `(w, h)` so the long edge equals `long_edge`, preserving aspect.
pub fn scaled_dimensions(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    let largest = width.max(height).max(1);
    let scale = long_edge as f32 / largest as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    (new_w, new_h)
}

/// Decode and normalize one document. Never mutates `bytes`.
pub fn normalize(
    bytes: &[u8],
    declared: DeclaredFormat,
    config: &NormalizerConfig,
) -> Result<RasterDocument, NormalizeError> {
    let format = resolve_format(bytes, declared)?;
    let decoded = decode_document(bytes, format, config.max_source_pixels)?;
    let (src_w, src_h) = decoded.dimensions();

    let source_dpi = src_w.max(src_h) as f32 / A4_LONG_EDGE_IN;
    let (w, h) = scaled_dimensions(src_w, src_h, working_long_edge(config.working_dpi));

    let rgb = decoded.to_rgb8();
    let gray = resample(&rgb_to_gray(&rgb), w, h);
    let color = config.keep_color.then(|| resample(&rgb, w, h));
    drop(decoded);

    let mut warnings = Vec::new();
    let mut low_confidence = false;
    if source_dpi < config.min_source_dpi {
        warnings.push(NormalizationWarning::LowResolution);
        low_confidence = true;
    }

    let threshold = otsu_threshold(&histogram(&gray));
    let skew = estimate_skew(
        &gray,
        threshold,
        config.max_skew_deg,
        config.min_skew_peak_ratio,
    );
    let (gray, color, skew_corrected_deg) = match skew {
        Some(est) if est.angle_deg.abs() >= MIN_CORRECTION_DEG => (
            rotate_about_center(&gray, est.angle_deg, Luma([PAPER])),
            color.map(|c| rotate_about_center(&c, est.angle_deg, Rgb([PAPER; 3]))),
            est.angle_deg,
        ),
        Some(_) => (gray, color, 0.0),
        None => {
            warnings.push(NormalizationWarning::NoReliableSkew);
            low_confidence = true;
            (gray, color, 0.0)
        }
    };

    warnings.extend(assess_quality(&gray));
    let equalized = equalize_local(&gray, config.equalize_tiles, config.equalize_clip_limit);

    debug!(
        format = format.as_str(),
        source = format!("{src_w}x{src_h}"),
        working = format!("{w}x{h}"),
        source_dpi,
        skew_corrected_deg,
        low_confidence,
        warnings = warnings.len(),
        "Document normalized"
    );

    Ok(RasterDocument::new(
        equalized,
        color,
        config.working_dpi,
        source_dpi,
        format,
        skew_corrected_deg,
        low_confidence,
        warnings,
    ))
}

/// CatmullRom (cubic spline) resize: no ringing around high-contrast
/// strokes. Skipped when the size already matches.
fn resample<P>(
    img: &image::ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::CatmullRom)
}
