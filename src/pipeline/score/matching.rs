//! Reference-to-observed region matching and per-pair deviation.

use crate::models::{NormBox, ReasonCode, Region, RegionTolerance, ShapeProfile};

/// Outcome of pairing a reference profile with an observed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matching {
    /// `(reference index, observed index)`, ordered by reference index.
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_reference: Vec<usize>,
    pub unmatched_observed: Vec<usize>,
}

/// Global greedy matching: every same-kind pair within `max_distance`
/// (page units, centre to centre) is ranked by distance and taken when both
/// ends are still free. Ties break on the lower indices.
pub fn match_regions(reference: &ShapeProfile, observed: &ShapeProfile, max_distance: f32) -> Matching {
    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for (ri, r) in reference.regions.iter().enumerate() {
        let rb = reference.norm_box(r);
        for (oi, _) in observed.regions_of(r.kind) {
            let d = rb.center_distance(&observed.norm_box(&observed.regions[oi]));
            if d <= max_distance {
                candidates.push((d, ri, oi));
            }
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut ref_taken = vec![false; reference.regions.len()];
    let mut obs_taken = vec![false; observed.regions.len()];
    let mut pairs = Vec::new();
    for (_, ri, oi) in candidates {
        if !ref_taken[ri] && !obs_taken[oi] {
            ref_taken[ri] = true;
            obs_taken[oi] = true;
            pairs.push((ri, oi));
        }
    }
    pairs.sort_unstable();

    Matching {
        pairs,
        unmatched_reference: (0..ref_taken.len()).filter(|&i| !ref_taken[i]).collect(),
        unmatched_observed: (0..obs_taken.len()).filter(|&i| !obs_taken[i]).collect(),
    }
}

/// Per-signal deviation, each in tolerance units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    pub position: f32,
    pub size: f32,
    pub confidence: f32,
}

impl Deviation {
    pub fn between(
        reference: (&NormBox, &Region),
        observed: (&NormBox, &Region),
        tolerance: &RegionTolerance,
    ) -> Self {
        let (rb, r) = reference;
        let (ob, o) = observed;
        let area_ratio = ob.area().max(f32::MIN_POSITIVE) / rb.area().max(f32::MIN_POSITIVE);
        Self {
            position: rb.center_distance(ob) / tolerance.position.max(f32::EPSILON),
            size: area_ratio.ln().abs() / tolerance.size.max(f32::EPSILON),
            confidence: (r.confidence - o.confidence).max(0.0)
                / tolerance.confidence.max(f32::EPSILON),
        }
    }

    /// The largest of the three signals.
    pub fn magnitude(&self) -> f32 {
        self.position.max(self.size).max(self.confidence)
    }

    /// Which signal dominates. Ties go to position, then size.
    pub fn reason(&self) -> ReasonCode {
        let m = self.magnitude();
        if self.position >= m {
            ReasonCode::PositionShift
        } else if self.size >= m {
            ReasonCode::ScaleMismatch
        } else {
            ReasonCode::ConfidenceDrop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BoundingBox, LogoIntegrity, RegionKind, SealPosition, ShapeSummary, TextAlignment,
    };

    fn profile(regions: Vec<Region>) -> ShapeProfile {
        ShapeProfile {
            page_width: 1000,
            page_height: 1000,
            regions,
            layout_score: 80.0,
            summary: ShapeSummary {
                seal_position: SealPosition::Absent,
                text_alignment: TextAlignment::Absent,
                logo_integrity: LogoIntegrity::Absent,
            },
            diagnostics: vec![],
        }
    }

    fn region(kind: RegionKind, x: u32, y: u32, w: u32, h: u32) -> Region {
        Region::new(kind, BoundingBox::new(x, y, w, h), 0.0, 0.9)
    }

    #[test]
    fn nearest_same_kind_pairs_win() {
        let reference = profile(vec![
            region(RegionKind::TextBlock, 100, 100, 400, 50),
            region(RegionKind::Seal, 100, 700, 150, 150),
        ]);
        let observed = profile(vec![
            region(RegionKind::TextBlock, 105, 102, 400, 50),
            region(RegionKind::Seal, 110, 700, 150, 150),
            region(RegionKind::Seal, 700, 100, 150, 150),
        ]);
        let m = match_regions(&reference, &observed, 0.2);
        assert_eq!(m.pairs, vec![(0, 0), (1, 1)]);
        assert!(m.unmatched_reference.is_empty());
        assert_eq!(m.unmatched_observed, vec![2]);
    }

    #[test]
    fn kinds_never_cross_match() {
        let reference = profile(vec![region(RegionKind::Seal, 100, 700, 150, 150)]);
        let observed = profile(vec![region(RegionKind::Logo, 100, 700, 150, 150)]);
        let m = match_regions(&reference, &observed, 0.2);
        assert!(m.pairs.is_empty());
        assert_eq!(m.unmatched_reference, vec![0]);
        assert_eq!(m.unmatched_observed, vec![0]);
    }

    #[test]
    fn far_regions_stay_unmatched() {
        let reference = profile(vec![region(RegionKind::Seal, 100, 700, 150, 150)]);
        let observed = profile(vec![region(RegionKind::Seal, 700, 100, 150, 150)]);
        let m = match_regions(&reference, &observed, 0.2);
        assert!(m.pairs.is_empty());
    }

    #[test]
    fn deviation_signals() {
        let tol = RegionTolerance::new(0.03, 0.35, 0.35);
        let r = region(RegionKind::Seal, 100, 700, 150, 150);
        let rb = r.bbox.normalized(1000, 1000);

        let same = Deviation::between((&rb, &r), (&rb, &r), &tol);
        assert_eq!(same.magnitude(), 0.0);

        let shifted = region(RegionKind::Seal, 160, 700, 150, 150);
        let sb = shifted.bbox.normalized(1000, 1000);
        let d = Deviation::between((&rb, &r), (&sb, &shifted), &tol);
        assert!((d.position - 2.0).abs() < 1e-3);
        assert_eq!(d.reason(), ReasonCode::PositionShift);

        let grown = region(RegionKind::Seal, 25, 625, 300, 300);
        let gb = grown.bbox.normalized(1000, 1000);
        let d = Deviation::between((&rb, &r), (&gb, &grown), &tol);
        assert_eq!(d.reason(), ReasonCode::ScaleMismatch);
        assert!(d.size > 3.0);

        let mut faded = r.clone();
        faded.confidence = 0.3;
        let d = Deviation::between((&rb, &r), (&rb, &faded), &tol);
        assert_eq!(d.reason(), ReasonCode::ConfidenceDrop);
        assert!((d.confidence - 0.6 / 0.35).abs() < 1e-3);
    }
}
