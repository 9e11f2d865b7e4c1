//! Result Assembler: packages stage outputs into the immutable report.
//!
//! The status is always recomputed from the score here; whatever the scorer
//! thought the verdict was is never carried through.

use std::cmp::Reverse;

use tracing::debug;

use crate::config::{StatusThresholds, APP_VERSION};
use crate::models::{
    ForgeryScore, MorphHash, NormalizationSummary, Provenance, ShapeProfile, Status,
    SuspiciousZone, ValidationReport, VerificationContext, ZoneSource,
};

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone)]
pub struct ReportParts {
    pub profile: ShapeProfile,
    pub morph_hash: MorphHash,
    pub score: ForgeryScore,
    pub zones: Vec<SuspiciousZone>,
    pub provenance: Provenance,
    pub normalization: NormalizationSummary,
    pub verification: VerificationContext,
    pub input_digest: String,
    pub raster_fingerprint: String,
}

pub fn assemble(parts: ReportParts, thresholds: &StatusThresholds) -> ValidationReport {
    let ReportParts {
        profile,
        morph_hash,
        score,
        mut zones,
        provenance,
        normalization,
        verification,
        input_digest,
        raster_fingerprint,
    } = parts;

    let status = Status::from_score(score.value, thresholds);
    zones.sort_by_key(|z| {
        (
            Reverse(z.confidence),
            z.region.source == ZoneSource::Reference,
            z.region.index,
        )
    });

    debug!(
        score = score.value,
        status = status.as_str(),
        zones = zones.len(),
        no_template = provenance.is_no_template(),
        "Report assembled"
    );

    ValidationReport {
        engine_version: APP_VERSION.to_string(),
        profile,
        morph_hash,
        forgery_score: score,
        status,
        suspicious_zones: zones,
        provenance,
        normalization,
        verification,
        input_digest,
        raster_fingerprint,
    }
}
