//! Application constants and engine configuration.
//!
//! Every business threshold the scorer applies (status split, tolerances,
//! region/hash weighting) lives here so institutions can calibrate them.
//! Morph-hash scheme parameters are deliberately absent: they belong to the
//! hash scheme version, not to configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::RegionKind;

/// Application-level constants
pub const APP_NAME: &str = "Certimorph";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "CERTIMORPH_LOG";

/// Log filter used when neither `CERTIMORPH_LOG` nor `RUST_LOG` is set.
pub fn default_log_filter() -> &'static str {
    "certimorph=info"
}

// ═══════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub extractor: ExtractorConfig,
    pub scoring: ScoringConfig,
    pub runtime: RuntimeConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON config document. Missing sections take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject settings that would make scores or statuses meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.normalizer;
        if !(n.working_dpi > 0.0) {
            return Err(invalid("normalizer.working_dpi must be positive"));
        }
        if n.max_source_pixels == 0 {
            return Err(invalid("normalizer.max_source_pixels must be positive"));
        }
        if n.equalize_tiles == 0 {
            return Err(invalid("normalizer.equalize_tiles must be at least 1"));
        }
        if !(n.max_skew_deg > 0.0 && n.max_skew_deg <= 45.0) {
            return Err(invalid("normalizer.max_skew_deg must be in (0, 45]"));
        }

        let e = &self.extractor;
        if !(0.0..1.0).contains(&e.overlap_tolerance) {
            return Err(invalid("extractor.overlap_tolerance must be in [0, 1)"));
        }
        let lw = &e.layout_weights;
        if lw.count + lw.regularity + lw.symmetry <= 0.0 {
            return Err(invalid("extractor.layout_weights must not all be zero"));
        }

        let s = &self.scoring;
        if s.status.suspicious_min >= s.status.authentic_min {
            return Err(invalid(
                "scoring.status.suspicious_min must be below authentic_min",
            ));
        }
        if s.status.authentic_min > 100 {
            return Err(invalid("scoring.status.authentic_min must be at most 100"));
        }
        if s.region_weight < 0.0 || s.hash_weight < 0.0 || s.region_weight + s.hash_weight <= 0.0
        {
            return Err(invalid("scoring region/hash weights must be non-negative and not both zero"));
        }
        if s.deviation_saturation <= s.deviation_floor {
            return Err(invalid("scoring.deviation_saturation must exceed deviation_floor"));
        }
        if s.zone_threshold >= s.deviation_saturation {
            return Err(invalid("scoring.zone_threshold must be below deviation_saturation"));
        }
        if s.hash_saturation_bits == 0 {
            return Err(invalid("scoring.hash_saturation_bits must be at least 1"));
        }
        let nt = &s.no_template;
        if nt.layout_weight + nt.zone_weight <= 0.0 {
            return Err(invalid("scoring.no_template weights must not both be zero"));
        }

        if self.runtime.workers == 0 {
            return Err(invalid("runtime.workers must be at least 1"));
        }
        if self.runtime.request_timeout_ms == 0 {
            return Err(invalid("runtime.request_timeout_ms must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

// ═══════════════════════════════════════════════════════════
// Normalizer
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Canonical working resolution. The long edge is resampled to
    /// `working_dpi × 11.69` pixels (A4 long edge).
    pub working_dpi: f32,
    /// Source scans estimated below this DPI are flagged low-confidence.
    pub min_source_dpi: f32,
    /// Skew search range (±degrees).
    pub max_skew_deg: f32,
    /// Peak/mean projection energy below this means "no reliable angle".
    pub min_skew_peak_ratio: f32,
    /// Tiles per axis for local histogram equalization.
    pub equalize_tiles: u32,
    /// Histogram clip limit, as a multiple of the uniform bin height.
    pub equalize_clip_limit: f32,
    /// Keep a resampled color copy on the raster.
    pub keep_color: bool,
    /// Decoded sources above this many pixels are rejected before any
    /// pixel buffer is allocated.
    pub max_source_pixels: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            working_dpi: 100.0,
            min_source_dpi: 40.0,
            max_skew_deg: 5.0,
            min_skew_peak_ratio: 1.10,
            equalize_tiles: 8,
            equalize_clip_limit: 2.5,
            keep_color: false,
            max_source_pixels: 64_000_000,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Horizontal glyph-merge radius as a fraction of page width.
    pub merge_gap_x: f32,
    /// Vertical glyph-merge radius as a fraction of page height.
    pub merge_gap_y: f32,
    /// Components with less ink than this fraction of the page are specks.
    pub min_component_fraction: f32,
    /// Same-kind boxes may overlap by at most this fraction of the smaller box.
    pub overlap_tolerance: f32,
    /// Text lines join a block when the vertical gap is at most this many line heights.
    pub text_group_gap_factor: f32,
    /// Minimum horizontal overlap (fraction of the narrower line) to join a block.
    pub text_min_overlap: f32,
    pub layout_weights: LayoutWeights,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            merge_gap_x: 0.008,
            merge_gap_y: 0.003,
            min_component_fraction: 0.000_02,
            overlap_tolerance: 0.10,
            text_group_gap_factor: 2.0,
            text_min_overlap: 0.30,
            layout_weights: LayoutWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutWeights {
    pub count: f32,
    pub regularity: f32,
    pub symmetry: f32,
}

impl Default for LayoutWeights {
    fn default() -> Self {
        Self {
            count: 0.40,
            regularity: 0.35,
            symmetry: 0.25,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Scoring
// ═══════════════════════════════════════════════════════════

/// Status split. Placeholder calibration pending a labeled corpus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusThresholds {
    /// `score >= authentic_min` → authentic.
    pub authentic_min: u8,
    /// `suspicious_min <= score < authentic_min` → suspicious; below → fake.
    pub suspicious_min: u8,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            authentic_min: 85,
            suspicious_min: 50,
        }
    }
}

/// Per-kind scoring weight. Kinds differ in weight only, never in behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KindWeights {
    pub text_block: f32,
    pub seal: f32,
    pub logo: f32,
    pub border: f32,
    pub signature: f32,
}

impl KindWeights {
    pub fn get(&self, kind: RegionKind) -> f32 {
        match kind {
            RegionKind::TextBlock => self.text_block,
            RegionKind::Seal => self.seal,
            RegionKind::Logo => self.logo,
            RegionKind::Border => self.border,
            RegionKind::Signature => self.signature,
        }
    }
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            text_block: 0.4,
            seal: 1.0,
            logo: 0.9,
            border: 0.5,
            signature: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoTemplatePolicy {
    pub layout_weight: f32,
    pub zone_weight: f32,
    /// Cross-kind overlap (fraction of the smaller box) tolerated before a zone.
    pub overlap_tolerance: f32,
    /// Seals and logos weaker than this are flagged.
    pub min_emblem_confidence: f32,
}

impl Default for NoTemplatePolicy {
    fn default() -> Self {
        Self {
            layout_weight: 0.5,
            zone_weight: 0.5,
            overlap_tolerance: 0.15,
            min_emblem_confidence: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub status: StatusThresholds,
    /// Share of the aggregate taken by per-region deviation.
    pub region_weight: f32,
    /// Share of the aggregate taken by morph-hash distance.
    pub hash_weight: f32,
    /// Normalized deviation above which a region becomes a suspicious zone.
    pub zone_threshold: f32,
    /// Deviations at or below this contribute no severity.
    pub deviation_floor: f32,
    /// Deviation at which severity saturates at 1.
    pub deviation_saturation: f32,
    /// Same-kind pairs farther apart (page units) are never matched.
    pub max_match_distance: f32,
    /// Hamming distance at or below which the template is accepted outright.
    pub identical_hash_distance: u32,
    /// Hamming distance that maps to a full hash anomaly of 100.
    pub hash_saturation_bits: u32,
    /// Severity of an observed emblem or signature the template does not have.
    pub unexpected_region_severity: f32,
    pub kind_weights: KindWeights,
    pub no_template: NoTemplatePolicy,
    pub uncertainty_with_template: u8,
    pub uncertainty_without_template: u8,
    pub low_confidence_uncertainty_penalty: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            status: StatusThresholds::default(),
            region_weight: 0.6,
            hash_weight: 0.4,
            zone_threshold: 1.0,
            deviation_floor: 0.25,
            deviation_saturation: 2.0,
            max_match_distance: 0.2,
            identical_hash_distance: 0,
            hash_saturation_bits: 64,
            unexpected_region_severity: 0.5,
            kind_weights: KindWeights::default(),
            no_template: NoTemplatePolicy::default(),
            uncertainty_with_template: 5,
            uncertainty_without_template: 20,
            low_confidence_uncertainty_penalty: 10,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Runtime
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Parallel documents in a batch.
    pub workers: usize,
    /// Whole-request budget covering decode and template lookup.
    pub request_timeout_ms: u64,
    /// Tighter budget for decode alone (capped by the request budget).
    pub decode_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            request_timeout_ms: 30_000,
            decode_timeout_ms: 20_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn app_name_is_certimorph() {
        assert_eq!(APP_NAME, "Certimorph");
    }

    #[test]
    fn default_status_split_is_85_50() {
        let t = StatusThresholds::default();
        assert_eq!(t.authentic_min, 85);
        assert_eq!(t.suspicious_min, 50);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "scoring": { "status": { "authentic_min": 90 } } }"#,
        )
        .unwrap();
        assert_eq!(config.scoring.status.authentic_min, 90);
        assert_eq!(config.scoring.status.suspicious_min, 50);
        assert!((config.scoring.region_weight - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.runtime.workers, 4);
    }

    #[test]
    fn inverted_status_split_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "scoring": { "status": { "authentic_min": 40, "suspicious_min": 60 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_weights_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.region_weight = 0.0;
        config.scoring.hash_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zone_threshold_above_saturation_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.zone_threshold = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = EngineConfig::default();
        config.runtime.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_pixel_budget_rejected() {
        let mut config = EngineConfig::default();
        config.normalizer.max_source_pixels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "runtime": { "workers": 2 } }"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.runtime.workers, 2);
    }

    #[test]
    fn kind_weights_lookup() {
        let w = KindWeights::default();
        assert!((w.get(RegionKind::Seal) - 1.0).abs() < f32::EPSILON);
        assert!(w.get(RegionKind::TextBlock) < w.get(RegionKind::Signature));
    }
}
