use image::{GrayImage, RgbImage};

use crate::models::{DocumentFormat, NormalizationSummary, NormalizationWarning};

/// Normalized page raster. Immutable once built: the pipeline invocation
/// that created it owns it and drops it at the end of the request.
#[derive(Debug, Clone)]
pub struct RasterDocument {
    gray: GrayImage,
    color: Option<RgbImage>,
    dpi: f32,
    source_dpi: f32,
    source_format: DocumentFormat,
    skew_corrected_deg: f32,
    low_confidence: bool,
    warnings: Vec<NormalizationWarning>,
}

impl RasterDocument {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        gray: GrayImage,
        color: Option<RgbImage>,
        dpi: f32,
        source_dpi: f32,
        source_format: DocumentFormat,
        skew_corrected_deg: f32,
        low_confidence: bool,
        warnings: Vec<NormalizationWarning>,
    ) -> Self {
        Self {
            gray,
            color,
            dpi,
            source_dpi,
            source_format,
            skew_corrected_deg,
            low_confidence,
            warnings,
        }
    }

    /// Wrap an already-normalized grayscale page (tests, tooling).
    pub fn from_gray(gray: GrayImage, dpi: f32) -> Self {
        Self::new(gray, None, dpi, dpi, DocumentFormat::Png, 0.0, false, Vec::new())
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn color(&self) -> Option<&RgbImage> {
        self.color.as_ref()
    }

    /// Working resolution after resampling.
    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Resolution estimated for the submitted scan.
    pub fn source_dpi(&self) -> f32 {
        self.source_dpi
    }

    pub fn source_format(&self) -> DocumentFormat {
        self.source_format
    }

    pub fn skew_corrected_deg(&self) -> f32 {
        self.skew_corrected_deg
    }

    /// Set when deskew found no reliable angle or the source was too coarse.
    pub fn low_confidence_normalization(&self) -> bool {
        self.low_confidence
    }

    pub fn warnings(&self) -> &[NormalizationWarning] {
        &self.warnings
    }

    pub fn summary(&self) -> NormalizationSummary {
        NormalizationSummary {
            source_format: self.source_format,
            width: self.width(),
            height: self.height(),
            dpi: self.dpi,
            source_dpi: self.source_dpi,
            skew_corrected_deg: self.skew_corrected_deg,
            low_confidence: self.low_confidence,
            warnings: self.warnings.clone(),
        }
    }
}
