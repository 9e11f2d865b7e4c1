//! Component classification and per-kind confidence.
//!
//! The rules are a data/policy table over page-relative geometry, so the
//! same thresholds hold at any working resolution.

use super::components::Component;
use crate::models::RegionKind;

/// Frames span at least this share of both page dimensions.
const BORDER_MIN_SPAN: f32 = 0.75;
/// ...and are mostly empty inside.
const BORDER_MAX_FILL: f32 = 0.20;

/// Rules and underlines: thinner than this share of the page...
const RULE_MAX_THICKNESS: f32 = 0.005;
/// ...and at least this elongated.
const RULE_MIN_ASPECT: f32 = 15.0;

/// Width/height at or above this is a line-like shape.
const ELONGATED_ASPECT: f32 = 2.0;
/// Merged-blob density separating text lines (dense) from strokes (sparse).
const DENSE_FILL: f32 = 0.6;
/// Text lines are at most this share of page height tall.
const TEXT_MAX_HEIGHT: f32 = 0.08;
/// Signatures are at least this share of page height tall.
const SIGNATURE_MIN_HEIGHT: f32 = 0.015;

/// Seals and logos: long side at least this share of the short page edge.
const EMBLEM_MIN_SIZE: f32 = 0.07;
/// Emblem size prior starts decaying above this.
const EMBLEM_MAX_SIZE: f32 = 0.35;
const SEAL_MIN_ROUNDNESS: f32 = 0.6;
const SEAL_ASPECT_RANGE: (f32, f32) = (0.75, 1.33);

/// Components whose long side is under this share of the short page edge are specks.
const SPECK_MAX_EXTENT: f32 = 0.004;

/// What a component turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Region(RegionKind),
    /// Grouped into text blocks later.
    TextLine,
    /// Specks, rules and ornaments that carry no layout signal.
    Decoration,
}

/// Page dimensions plus the speck floor.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub min_ink: u64,
}

impl PageGeometry {
    fn short_edge(&self) -> f32 {
        self.width.min(self.height).max(1) as f32
    }
}

pub fn classify(c: &Component, page: &PageGeometry) -> Shape {
    let (pw, ph) = (page.width.max(1) as f32, page.height.max(1) as f32);
    let (w, h) = (c.bbox.width as f32, c.bbox.height as f32);
    let size = w.max(h) / page.short_edge();

    if c.ink_count < page.min_ink || size < SPECK_MAX_EXTENT {
        return Shape::Decoration;
    }

    if w >= BORDER_MIN_SPAN * pw && h >= BORDER_MIN_SPAN * ph && c.fill() <= BORDER_MAX_FILL {
        return Shape::Region(RegionKind::Border);
    }

    let is_rule = (h <= RULE_MAX_THICKNESS * ph && w / h >= RULE_MIN_ASPECT)
        || (w <= RULE_MAX_THICKNESS * pw && h / w >= RULE_MIN_ASPECT);
    if is_rule {
        return Shape::Decoration;
    }

    let aspect = c.bbox.aspect();
    let dense = c.merged_fill() >= DENSE_FILL;

    if aspect >= ELONGATED_ASPECT {
        return if dense && h <= TEXT_MAX_HEIGHT * ph {
            Shape::TextLine
        } else if dense {
            // banner-like block
            Shape::Region(RegionKind::Logo)
        } else if h >= SIGNATURE_MIN_HEIGHT * ph {
            Shape::Region(RegionKind::Signature)
        } else {
            Shape::Decoration
        };
    }

    if size >= EMBLEM_MIN_SIZE {
        let round_aspect = (SEAL_ASPECT_RANGE.0..=SEAL_ASPECT_RANGE.1).contains(&aspect);
        return if c.roundness >= SEAL_MIN_ROUNDNESS && round_aspect {
            Shape::Region(RegionKind::Seal)
        } else {
            Shape::Region(RegionKind::Logo)
        };
    }

    // short words and isolated glyph clusters
    if dense && h <= TEXT_MAX_HEIGHT * ph && aspect >= 1.0 / ELONGATED_ASPECT {
        return Shape::TextLine;
    }
    Shape::Decoration
}

/// Confidence from the strength of the geometric signal for `shape`.
pub fn confidence(shape: Shape, c: &Component, page: &PageGeometry) -> f32 {
    let value = match shape {
        Shape::Region(RegionKind::Border) => {
            let coverage = (c.bbox.width as f32 / page.width.max(1) as f32)
                .min(c.bbox.height as f32 / page.height.max(1) as f32);
            0.4 * c.symmetry + 0.3 * c.contrast + 0.3 * coverage
        }
        Shape::Region(RegionKind::Seal) => {
            (0.4 * c.roundness + 0.3 * c.symmetry + 0.3 * c.contrast) * size_prior(c, page)
        }
        Shape::Region(RegionKind::Logo) => {
            (0.5 * c.symmetry + 0.5 * c.contrast) * size_prior(c, page)
        }
        Shape::Region(RegionKind::Signature) => {
            let sparseness = ((1.0 - c.merged_fill()) / 0.5).min(1.0);
            0.6 * c.contrast + 0.4 * sparseness
        }
        Shape::Region(RegionKind::TextBlock) | Shape::TextLine => {
            0.6 * c.contrast + 0.4 * c.merged_fill()
        }
        Shape::Decoration => 0.0,
    };
    value.clamp(0.0, 1.0)
}

fn size_prior(c: &Component, page: &PageGeometry) -> f32 {
    let size = c.bbox.width.max(c.bbox.height) as f32 / page.short_edge();
    if size <= EMBLEM_MAX_SIZE {
        1.0
    } else {
        (1.0 - (size - EMBLEM_MAX_SIZE) / EMBLEM_MAX_SIZE).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    const PAGE: PageGeometry = PageGeometry {
        width: 1000,
        height: 700,
        min_ink: 10,
    };

    fn component(bbox: BoundingBox, ink_count: u64, merged_fill: f32) -> Component {
        let merged_bbox = bbox;
        Component {
            bbox,
            merged_bbox,
            ink_count,
            merged_count: (merged_fill * merged_bbox.area() as f32) as u64,
            orientation_deg: 0.0,
            roundness: 0.0,
            symmetry: 0.9,
            contrast: 0.85,
        }
    }

    #[test]
    fn frame_is_border() {
        let c = component(BoundingBox::new(20, 20, 960, 660), 20_000, 0.05);
        assert_eq!(classify(&c, &PAGE), Shape::Region(RegionKind::Border));
    }

    #[test]
    fn dense_line_is_text() {
        let c = component(BoundingBox::new(100, 100, 400, 14), 3_000, 0.95);
        assert_eq!(classify(&c, &PAGE), Shape::TextLine);
    }

    #[test]
    fn sparse_tall_stroke_is_signature() {
        let c = component(BoundingBox::new(600, 500, 200, 50), 1_500, 0.4);
        assert_eq!(classify(&c, &PAGE), Shape::Region(RegionKind::Signature));
    }

    #[test]
    fn round_compact_is_seal_square_is_logo() {
        let mut round = component(BoundingBox::new(100, 400, 140, 140), 5_000, 0.6);
        round.roundness = 0.95;
        assert_eq!(classify(&round, &PAGE), Shape::Region(RegionKind::Seal));

        let square = component(BoundingBox::new(450, 50, 90, 90), 7_000, 1.0);
        assert_eq!(classify(&square, &PAGE), Shape::Region(RegionKind::Logo));
    }

    #[test]
    fn rules_and_specks_are_decoration() {
        let rule = component(BoundingBox::new(100, 300, 600, 3), 1_800, 1.0);
        assert_eq!(classify(&rule, &PAGE), Shape::Decoration);

        let speck = component(BoundingBox::new(5, 5, 2, 2), 4, 1.0);
        assert_eq!(classify(&speck, &PAGE), Shape::Decoration);
    }

    #[test]
    fn oversized_emblem_loses_confidence() {
        let mut normal = component(BoundingBox::new(100, 100, 140, 140), 5_000, 0.6);
        normal.roundness = 0.95;
        let mut huge = component(BoundingBox::new(0, 0, 500, 500), 50_000, 0.6);
        huge.roundness = 0.95;
        let shape = Shape::Region(RegionKind::Seal);
        assert!(confidence(shape, &huge, &PAGE) < confidence(shape, &normal, &PAGE));
    }

    #[test]
    fn confidence_in_unit_range() {
        let c = component(BoundingBox::new(100, 100, 400, 14), 3_000, 0.95);
        for shape in [
            Shape::TextLine,
            Shape::Region(RegionKind::Seal),
            Shape::Region(RegionKind::Logo),
            Shape::Region(RegionKind::Border),
            Shape::Region(RegionKind::Signature),
            Shape::Decoration,
        ] {
            let v = confidence(shape, &c, &PAGE);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
