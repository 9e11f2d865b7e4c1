//! Plausibility heuristics used when no template is available.

use crate::config::NoTemplatePolicy;
use crate::models::{ReasonCode, RegionKind, ShapeProfile, SuspiciousZone, ZoneSource};
use crate::pipeline::extract::layout::implausible_counts;

use super::zone;

/// Kind pairs that must not sit on top of each other. The first kind of
/// each pair is the one flagged.
const EXCLUSIVE_PAIRS: [(RegionKind, RegionKind); 3] = [
    (RegionKind::Signature, RegionKind::Seal),
    (RegionKind::Seal, RegionKind::Logo),
    (RegionKind::Logo, RegionKind::TextBlock),
];

/// Zones for internal inconsistencies: overlapping exclusive kinds, surplus
/// regions of a kind, and weak emblems.
pub fn intrinsic_zones(profile: &ShapeProfile, policy: &NoTemplatePolicy) -> Vec<SuspiciousZone> {
    let mut zones = Vec::new();

    for (flagged, other) in EXCLUSIVE_PAIRS {
        for (i, a) in profile.regions_of(flagged) {
            let worst = profile
                .regions_of(other)
                .map(|(_, b)| a.bbox.overlap_fraction(&b.bbox))
                .fold(0.0f32, f32::max);
            if worst > policy.overlap_tolerance {
                let excess = (worst - policy.overlap_tolerance) / (1.0 - policy.overlap_tolerance);
                zones.push(zone(
                    ZoneSource::Observed,
                    i,
                    a,
                    excess,
                    ReasonCode::RegionOverlap,
                ));
            }
        }
    }

    for (kind, excess) in implausible_counts(&profile.regions) {
        // surplus only; a missing kind has no region to point at
        let mut present: Vec<_> = profile.regions_of(kind).collect();
        if present.is_empty() {
            continue;
        }
        present.sort_by(|a, b| a.1.confidence.total_cmp(&b.1.confidence).then(a.0.cmp(&b.0)));
        let strength = excess as f32 / (excess as f32 + 1.0);
        for (i, region) in present.into_iter().take(excess) {
            zones.push(zone(
                ZoneSource::Observed,
                i,
                region,
                strength,
                ReasonCode::ImplausibleCount,
            ));
        }
    }

    for kind in [RegionKind::Seal, RegionKind::Logo] {
        for (i, region) in profile.regions_of(kind) {
            if region.confidence < policy.min_emblem_confidence {
                let deficit = (policy.min_emblem_confidence - region.confidence)
                    / policy.min_emblem_confidence;
                zones.push(zone(
                    ZoneSource::Observed,
                    i,
                    region,
                    deficit,
                    ReasonCode::ConfidenceDrop,
                ));
            }
        }
    }
    zones
}
