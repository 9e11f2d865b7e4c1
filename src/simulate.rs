//! Simulated validator for UI development.
//!
//! Produces plausible random reports behind the same [`Validator`] seam as the
//! real engine. Randomness is seeded from the input digest, so one file always
//! gets the same fake report. Status still comes from the real assembler, so
//! the score/status contract holds for simulated output too.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::{lookup_template, ValidationRequest, Validator};
use crate::error::EngineError;
use crate::models::{
    BoundingBox, ForgeryScore, LogoIntegrity, MorphHash, NormalizationSummary, Provenance,
    ReasonCode, Region, RegionKind, RegionRef, SealPosition, ShapeProfile, ShapeSummary,
    SuspiciousZone, TextAlignment, ValidationReport, VerificationContext, ZoneSource,
    HASH_SCHEME_VERSION,
};
use crate::pipeline::assemble::{assemble, ReportParts};
use crate::pipeline::hash::input_digest;
use crate::pipeline::normalize::format::resolve_format;
use crate::pipeline::normalize::{scaled_dimensions, working_long_edge};
use crate::templates::TemplateResolver;

/// Scores below this come with zones attached.
const ZONE_SCORE_CUTOFF: u8 = 70;

/// Page shape the fake profile is laid out on (landscape A4).
const PAGE_ASPECT: (u32, u32) = (1169, 826);

#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    config: EngineConfig,
}

impl SimulatedEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Validator for SimulatedEngine {
    async fn validate(
        &self,
        request: ValidationRequest,
        resolver: &dyn TemplateResolver,
    ) -> Result<ValidationReport, EngineError> {
        if request.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        // unreadable input fails here exactly as it would for real
        let format = resolve_format(&request.bytes, request.format)?;
        let mut rng = StdRng::from_seed(Sha256::digest(&request.bytes).into());

        let budget_ms = self.config.runtime.request_timeout_ms;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(budget_ms);
        let template =
            lookup_template(resolver, request.template_key.as_ref(), deadline, budget_ms).await?;
        let provenance = match template.as_deref() {
            Some(t) => Provenance::Template {
                template_id: t.id(),
                key: t.key.clone(),
                schema_version: t.schema_version,
                engine_version: t.engine_version,
            },
            None => Provenance::NoTemplate,
        };

        let (width, height) = scaled_dimensions(
            PAGE_ASPECT.0,
            PAGE_ASPECT.1,
            working_long_edge(self.config.normalizer.working_dpi),
        );
        let profile = random_profile(&mut rng, width, height);
        let value: u8 = rng.gen_range(0..=100);
        let zones = if value < ZONE_SCORE_CUTOFF {
            random_zones(&mut rng, &profile)
        } else {
            Vec::new()
        };
        let bits: Vec<bool> = (0..256).map(|_| rng.gen()).collect();

        debug!(request_id = %request.request_id, score = value, "Simulated validation");

        Ok(assemble(
            ReportParts {
                profile,
                morph_hash: MorphHash::from_bits(&bits, HASH_SCHEME_VERSION),
                score: ForgeryScore::new(value, self.config.scoring.uncertainty_without_template),
                zones,
                provenance,
                normalization: NormalizationSummary {
                    source_format: format,
                    width,
                    height,
                    dpi: self.config.normalizer.working_dpi,
                    source_dpi: self.config.normalizer.working_dpi,
                    skew_corrected_deg: 0.0,
                    low_confidence: false,
                    warnings: vec![],
                },
                verification: VerificationContext {
                    offline_mode: request.offline_mode,
                    template_source: resolver.source(),
                },
                input_digest: input_digest(&request.bytes),
                raster_fingerprint: String::new(),
            },
            &self.config.scoring.status,
        ))
    }
}

/// Text block, signature, and a seal or logo, placed on a plausible grid.
fn random_profile(rng: &mut StdRng, width: u32, height: u32) -> ShapeProfile {
    let at = |fx: f32, fy: f32, fw: f32, fh: f32| {
        BoundingBox::new(
            (fx * width as f32) as u32,
            (fy * height as f32) as u32,
            ((fw * width as f32) as u32).max(1),
            ((fh * height as f32) as u32).max(1),
        )
    };
    let mut regions = vec![
        Region::new(
            RegionKind::TextBlock,
            at(0.2, rng.gen_range(0.25..0.35), 0.6, 0.25),
            0.0,
            rng.gen_range(0.6..1.0),
        ),
        Region::new(
            RegionKind::Signature,
            at(rng.gen_range(0.6..0.7), 0.75, 0.2, 0.07),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(0.5..1.0),
        ),
    ];
    if rng.gen_bool(0.8) {
        regions.push(Region::new(
            RegionKind::Seal,
            at(rng.gen_range(0.1..0.2), 0.7, 0.12, 0.17),
            0.0,
            rng.gen_range(0.5..1.0),
        ));
    }
    if rng.gen_bool(0.8) {
        regions.push(Region::new(
            RegionKind::Logo,
            at(0.46, 0.08, 0.08, 0.11),
            0.0,
            rng.gen_range(0.5..1.0),
        ));
    }
    regions.sort_by_key(Region::sort_key);

    let seal_position = *[
        SealPosition::TopRight,
        SealPosition::BottomLeft,
        SealPosition::Center,
    ]
    .choose(rng)
    .unwrap_or(&SealPosition::Absent);
    let text_alignment = *[
        TextAlignment::Justified,
        TextAlignment::LeftAligned,
        TextAlignment::CenterAligned,
    ]
    .choose(rng)
    .unwrap_or(&TextAlignment::Absent);
    let logo_integrity = *[
        LogoIntegrity::Intact,
        LogoIntegrity::PartiallyDamaged,
        LogoIntegrity::Suspicious,
    ]
    .choose(rng)
    .unwrap_or(&LogoIntegrity::Absent);

    ShapeProfile {
        page_width: width,
        page_height: height,
        regions,
        layout_score: rng.gen_range(0..100) as f32,
        summary: ShapeSummary {
            seal_position,
            text_alignment,
            logo_integrity,
        },
        diagnostics: vec![],
    }
}

/// One signature zone and one text zone.
fn random_zones(rng: &mut StdRng, profile: &ShapeProfile) -> Vec<SuspiciousZone> {
    let picks = [
        (RegionKind::Signature, 60..100, ReasonCode::ConfidenceDrop),
        (RegionKind::TextBlock, 70..100, ReasonCode::ScaleMismatch),
    ];
    picks
        .into_iter()
        .filter_map(|(kind, range, reason)| {
            let (index, region) = profile.regions_of(kind).next()?;
            Some(SuspiciousZone {
                region: RegionRef {
                    source: ZoneSource::Observed,
                    index,
                    kind,
                    bbox: region.bbox,
                },
                confidence: rng.gen_range(range),
                reason,
            })
        })
        .collect()
}
