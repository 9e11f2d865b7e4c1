//! Shape Feature Extractor: normalized raster in, `ShapeProfile` out.
//!
//! Pipeline flow:
//! 1. Otsu threshold → ink mask
//! 2. Box dilation merges glyphs into lines
//! 3. Connected components with ink statistics
//! 4. Classification into region kinds (text lines kept aside)
//! 5. Text lines grouped into blocks, same-kind overlaps merged
//! 6. Canonical ordering, layout score, summary, diagnostics
//!
//! Extraction never fails: a page without structure yields an empty,
//! zero-scored profile with a diagnostic.

pub mod binarize;
pub mod classify;
pub mod components;
pub mod layout;

use tracing::debug;

use crate::config::ExtractorConfig;
use crate::models::{ProfileDiagnostic, Region, RegionKind, ShapeProfile};
use crate::pipeline::normalize::enhance::{histogram, otsu_threshold};
use crate::pipeline::normalize::RasterDocument;

use binarize::InkMask;
use classify::{classify, confidence, PageGeometry, Shape};
use components::find_components;
use layout::{group_text_lines, layout_score, merge_overlapping, summarize, TextLine};

pub fn extract(doc: &RasterDocument, config: &ExtractorConfig) -> ShapeProfile {
    let (w, h) = (doc.width(), doc.height());
    let threshold = otsu_threshold(&histogram(doc.gray()));
    let ink = InkMask::from_threshold(doc.gray(), threshold);

    let rx = (config.merge_gap_x * w as f32).round() as u32;
    let ry = (config.merge_gap_y * h as f32).round() as u32;
    let merged = ink.dilate(rx, ry);
    let components = find_components(doc.gray(), &ink, &merged);

    let page = PageGeometry {
        width: w,
        height: h,
        min_ink: (config.min_component_fraction * (w as f32 * h as f32)).ceil() as u64,
    };

    let mut regions = Vec::new();
    let mut lines = Vec::new();
    let mut decorations = 0usize;
    for c in &components {
        let shape = classify(c, &page);
        let conf = confidence(shape, c, &page);
        match shape {
            Shape::Region(kind) => {
                regions.push(Region::new(kind, c.bbox, c.orientation_deg, conf));
            }
            Shape::TextLine => lines.push(TextLine {
                bbox: c.bbox,
                orientation_deg: c.orientation_deg,
                confidence: conf,
            }),
            Shape::Decoration => decorations += 1,
        }
    }

    let blocks = group_text_lines(&lines, config);
    regions.extend(blocks.iter().map(|b| b.region.clone()));
    let mut regions = merge_overlapping(regions, config.overlap_tolerance);
    regions.sort_by_key(Region::sort_key);

    let text_blocks = regions.iter().filter(|r| r.kind == RegionKind::TextBlock).count();
    let mut diagnostics = Vec::new();
    if text_blocks == 0 {
        diagnostics.push(ProfileDiagnostic::NoTextBlocks);
    }
    if doc.low_confidence_normalization() {
        diagnostics.push(ProfileDiagnostic::LowConfidenceNormalization);
    }

    let layout = layout_score(&regions, &blocks, w, h, &config.layout_weights);
    let summary = summarize(&regions, &blocks, w, h);

    debug!(
        threshold,
        components = components.len(),
        regions = regions.len(),
        text_lines = lines.len(),
        text_blocks,
        decorations,
        layout_score = layout,
        "Shape profile extracted"
    );

    ShapeProfile {
        page_width: w,
        page_height: h,
        regions,
        layout_score: layout,
        summary,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogoIntegrity, SealPosition, TextAlignment};
    use crate::test_support::{normalized_certificate, CertificateSpec};

    fn fixture_profile(spec: &CertificateSpec) -> ShapeProfile {
        extract(&normalized_certificate(spec), &ExtractorConfig::default())
    }

    #[test]
    fn fixture_regions_are_found() {
        let profile = fixture_profile(&CertificateSpec::default());
        assert_eq!(profile.count_of(RegionKind::Border), 1, "{:#?}", profile.regions);
        assert_eq!(profile.count_of(RegionKind::Seal), 1, "{:#?}", profile.regions);
        assert_eq!(profile.count_of(RegionKind::Logo), 1, "{:#?}", profile.regions);
        assert_eq!(profile.count_of(RegionKind::Signature), 1, "{:#?}", profile.regions);
        assert_eq!(profile.count_of(RegionKind::TextBlock), 3, "{:#?}", profile.regions);
        assert!(profile.diagnostics.is_empty());
        profile
            .check_invariants(ExtractorConfig::default().overlap_tolerance)
            .unwrap();
    }

    #[test]
    fn seal_box_matches_drawing() {
        let profile = fixture_profile(&CertificateSpec::default());
        let (_, seal) = profile.regions_of(RegionKind::Seal).next().unwrap();
        let (cx, cy) = seal.bbox.center();
        assert!((cx - 260.5).abs() <= 2.0 && (cy - 640.5).abs() <= 2.0, "{:?}", seal.bbox);
        assert!(seal.confidence > 0.7, "seal confidence {}", seal.confidence);
    }

    #[test]
    fn fixture_summary() {
        let profile = fixture_profile(&CertificateSpec::default());
        assert_eq!(profile.summary.seal_position, SealPosition::BottomLeft);
        assert_eq!(profile.summary.text_alignment, TextAlignment::CenterAligned);
        assert_eq!(profile.summary.logo_integrity, LogoIntegrity::Intact);
        assert!(profile.layout_score > 70.0, "layout {}", profile.layout_score);
    }

    #[test]
    fn moved_seal_changes_position_label() {
        let profile = fixture_profile(&CertificateSpec::with_moved_seal());
        assert_eq!(profile.summary.seal_position, SealPosition::TopRight);
    }

    #[test]
    fn extraction_is_deterministic() {
        let doc = normalized_certificate(&CertificateSpec::default());
        let config = ExtractorConfig::default();
        assert_eq!(extract(&doc, &config), extract(&doc, &config));
    }

    #[test]
    fn blank_page_yields_empty_profile_with_diagnostic() {
        let profile = fixture_profile(&CertificateSpec::blank());
        assert!(profile.regions.is_empty());
        assert_eq!(profile.layout_score, 0.0);
        assert!(profile.has_diagnostic(ProfileDiagnostic::NoTextBlocks));
        assert!(profile.has_diagnostic(ProfileDiagnostic::LowConfidenceNormalization));
    }

    #[test]
    fn emblems_without_text_score_zero() {
        let spec = CertificateSpec {
            text: false,
            ..CertificateSpec::default()
        };
        let profile = fixture_profile(&spec);
        assert_eq!(profile.count_of(RegionKind::TextBlock), 0);
        assert!(profile.count_of(RegionKind::Seal) == 1);
        assert_eq!(profile.layout_score, 0.0);
        assert!(profile.has_diagnostic(ProfileDiagnostic::NoTextBlocks));
    }
}
