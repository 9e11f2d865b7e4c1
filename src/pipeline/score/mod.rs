//! Forgery Scorer & Anomaly Localizer.
//!
//! With a template: hash pre-filter, then per-region matching and deviation,
//! blended with the hash distance. Without one: layout deficit and internal
//! consistency only, reported with a wider uncertainty. The no-template path
//! cannot fail.

pub mod intrinsic;
pub mod matching;

use tracing::{debug, error};

use crate::config::ScoringConfig;
use crate::error::EngineError;
use crate::models::{
    ForgeryScore, MorphHash, ProfileDiagnostic, ReasonCode, Region, RegionRef, ShapeProfile,
    SuspiciousZone, Template, ZoneSource,
};

use intrinsic::intrinsic_zones;
use matching::{match_regions, Deviation};

/// Score plus the zones that explain it, in detection order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: ForgeryScore,
    pub zones: Vec<SuspiciousZone>,
}

pub fn score(
    profile: &ShapeProfile,
    hash: &MorphHash,
    template: Option<&Template>,
    config: &ScoringConfig,
) -> Result<ScoreOutcome, EngineError> {
    match template {
        Some(template) => score_against_template(profile, hash, template, config),
        None => Ok(score_without_template(profile, config)),
    }
}

// ═══════════════════════════════════════════════════════════
// With template
// ═══════════════════════════════════════════════════════════

fn score_against_template(
    profile: &ShapeProfile,
    hash: &MorphHash,
    template: &Template,
    config: &ScoringConfig,
) -> Result<ScoreOutcome, EngineError> {
    if let Err(e) = template.ensure_compatible() {
        if let EngineError::InternalInvariant(detail) = &e {
            error!(template = %template.key, %detail, "Template rejected");
        }
        return Err(e);
    }
    let distance = hash.hamming(&template.reference_hash)?;
    let uncertainty = uncertainty(profile, config.uncertainty_with_template, config);

    if distance <= config.identical_hash_distance {
        debug!(distance, template = %template.key, "Hash pre-filter accepted document");
        return Ok(ScoreOutcome {
            score: ForgeryScore::new(100, uncertainty),
            zones: Vec::new(),
        });
    }

    let reference = &template.reference_profile;
    let matching = match_regions(reference, profile, config.max_match_distance);
    let mut zones = Vec::new();
    let mut severities = Vec::new();

    for &(ri, oi) in &matching.pairs {
        let (r, o) = (&reference.regions[ri], &profile.regions[oi]);
        let tolerance = template.tolerances.get(r.kind);
        let deviation = Deviation::between(
            (&reference.norm_box(r), r),
            (&profile.norm_box(o), o),
            &tolerance,
        );
        let d = deviation.magnitude();
        severities.push((r.kind, severity(d, config)));
        if d > config.zone_threshold {
            let span = (config.deviation_saturation - config.zone_threshold).max(f32::EPSILON);
            zones.push(zone(
                ZoneSource::Observed,
                oi,
                o,
                (d - config.zone_threshold) / span,
                deviation.reason(),
            ));
        }
    }

    let same_page = (reference.page_width, reference.page_height)
        == (profile.page_width, profile.page_height);
    for &ri in &matching.unmatched_reference {
        let r = &reference.regions[ri];
        severities.push((r.kind, 1.0));
        // Zones always locate on the submitted page.
        let located = if same_page {
            r.clone()
        } else {
            Region {
                bbox: reference
                    .norm_box(r)
                    .to_pixels(profile.page_width, profile.page_height),
                ..r.clone()
            }
        };
        zones.push(zone(
            ZoneSource::Reference,
            ri,
            &located,
            r.confidence,
            ReasonCode::MissingExpectedRegion,
        ));
    }

    for &oi in &matching.unmatched_observed {
        let o = &profile.regions[oi];
        if !o.kind.is_emblem_like() {
            continue;
        }
        severities.push((o.kind, config.unexpected_region_severity));
        zones.push(zone(
            ZoneSource::Observed,
            oi,
            o,
            config.unexpected_region_severity * o.confidence,
            ReasonCode::UnexpectedRegion,
        ));
    }

    let weighted: Vec<f32> = severities
        .iter()
        .map(|&(kind, s)| config.kind_weights.get(kind) * s)
        .collect();
    let region_anomaly = region_magnitude(&weighted);
    let hash_anomaly = 100.0 * (distance as f32 / config.hash_saturation_bits as f32).min(1.0);
    let aggregate = (config.region_weight * region_anomaly + config.hash_weight * hash_anomaly)
        / (config.region_weight + config.hash_weight);
    let score = ForgeryScore::from_anomaly(aggregate, uncertainty);

    debug!(
        template = %template.key,
        distance,
        matched = matching.pairs.len(),
        missing = matching.unmatched_reference.len(),
        region_anomaly,
        hash_anomaly,
        score = score.value,
        zones = zones.len(),
        "Scored against template"
    );
    Ok(ScoreOutcome { score, zones })
}

/// Deviation mapped to 0..1: nothing up to the floor, saturating at the top.
fn severity(deviation: f32, config: &ScoringConfig) -> f32 {
    let span = (config.deviation_saturation - config.deviation_floor).max(f32::EPSILON);
    ((deviation - config.deviation_floor) / span).clamp(0.0, 1.0)
}

/// Largest weighted severity plus half of the rest, as 0-100.
fn region_magnitude(weighted: &[f32]) -> f32 {
    let max = weighted.iter().copied().fold(0.0f32, f32::max);
    let sum: f32 = weighted.iter().sum();
    100.0 * (max + 0.5 * (sum - max)).min(1.0)
}

// ═══════════════════════════════════════════════════════════
// Without template
// ═══════════════════════════════════════════════════════════

pub fn score_without_template(profile: &ShapeProfile, config: &ScoringConfig) -> ScoreOutcome {
    let policy = &config.no_template;
    let zones = intrinsic_zones(profile, policy);
    let layout_deficit = (100.0 - profile.layout_score).clamp(0.0, 100.0);
    let zone_anomaly = zones
        .iter()
        .map(|z| z.confidence as f32 * 0.5)
        .sum::<f32>()
        .min(100.0);
    let aggregate = (policy.layout_weight * layout_deficit + policy.zone_weight * zone_anomaly)
        / (policy.layout_weight + policy.zone_weight);
    let uncertainty = uncertainty(profile, config.uncertainty_without_template, config);
    let score = ForgeryScore::from_anomaly(aggregate, uncertainty);

    debug!(
        layout_score = profile.layout_score,
        zone_anomaly,
        score = score.value,
        zones = zones.len(),
        "Scored without template"
    );
    ScoreOutcome { score, zones }
}

fn uncertainty(profile: &ShapeProfile, base: u8, config: &ScoringConfig) -> u8 {
    if profile.has_diagnostic(ProfileDiagnostic::LowConfidenceNormalization) {
        base.saturating_add(config.low_confidence_uncertainty_penalty)
    } else {
        base
    }
}

/// Zone with confidence `strength` (0..1) mapped to 1..=100.
pub(crate) fn zone(
    source: ZoneSource,
    index: usize,
    region: &Region,
    strength: f32,
    reason: ReasonCode,
) -> SuspiciousZone {
    let confidence = (100.0 * strength.clamp(0.0, 1.0)).round().max(1.0) as u8;
    SuspiciousZone {
        region: RegionRef {
            source,
            index,
            kind: region.kind,
            bbox: region.bbox,
        },
        confidence,
        reason,
    }
}
