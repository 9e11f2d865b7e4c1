use serde::{Deserialize, Serialize};

use super::enums::{
    DocumentFormat, NormalizationWarning, ReasonCode, RegionKind, Status, TemplateSource,
    ZoneSource,
};
use super::geometry::BoundingBox;
use super::morph_hash::MorphHash;
use super::profile::ShapeProfile;
use super::template::TemplateKey;
use crate::config::StatusThresholds;

/// Integer score in 0-100; higher means more likely genuine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeryScore {
    pub value: u8,
    /// Half-width of the band the score is believed to sit in, in points.
    pub uncertainty: u8,
}

impl ForgeryScore {
    pub fn new(value: u8, uncertainty: u8) -> Self {
        Self {
            value: value.min(100),
            uncertainty: uncertainty.min(100),
        }
    }

    /// `100 − clamp(anomaly, 0, 100)`, rounded.
    pub fn from_anomaly(anomaly: f32, uncertainty: u8) -> Self {
        let anomaly = if anomaly.is_finite() {
            anomaly.clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self::new(100 - anomaly.round() as u8, uncertainty)
    }
}

impl Status {
    pub fn from_score(score: u8, thresholds: &StatusThresholds) -> Status {
        if score >= thresholds.authentic_min {
            Status::Authentic
        } else if score >= thresholds.suspicious_min {
            Status::Suspicious
        } else {
            Status::Fake
        }
    }
}

/// Points at one region of either the observed or the reference profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRef {
    pub source: ZoneSource,
    /// Index into that profile's `regions`.
    pub index: usize,
    pub kind: RegionKind,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousZone {
    pub region: RegionRef,
    /// 0-100, proportional to the excess over the zone threshold.
    pub confidence: u8,
    pub reason: ReasonCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Provenance {
    Template {
        template_id: String,
        key: TemplateKey,
        schema_version: u32,
        engine_version: u32,
    },
    NoTemplate,
}

impl Provenance {
    pub fn is_no_template(&self) -> bool {
        matches!(self, Provenance::NoTemplate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub source_format: DocumentFormat,
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
    pub source_dpi: f32,
    pub skew_corrected_deg: f32,
    pub low_confidence: bool,
    pub warnings: Vec<NormalizationWarning>,
}

/// Which template channel the caller used. The engine only records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationContext {
    pub offline_mode: bool,
    pub template_source: TemplateSource,
}

/// Everything the UI shows for one document. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub engine_version: String,
    pub profile: ShapeProfile,
    pub morph_hash: MorphHash,
    pub forgery_score: ForgeryScore,
    pub status: Status,
    pub suspicious_zones: Vec<SuspiciousZone>,
    pub provenance: Provenance,
    pub normalization: NormalizationSummary,
    pub verification: VerificationContext,
    /// SHA-256 of the submitted bytes, base64.
    pub input_digest: String,
    /// Perceptual fingerprint of the normalized raster, base64.
    pub raster_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_boundaries_follow_thresholds() {
        let t = StatusThresholds::default();
        assert_eq!(Status::from_score(100, &t), Status::Authentic);
        assert_eq!(Status::from_score(85, &t), Status::Authentic);
        assert_eq!(Status::from_score(84, &t), Status::Suspicious);
        assert_eq!(Status::from_score(50, &t), Status::Suspicious);
        assert_eq!(Status::from_score(49, &t), Status::Fake);
        assert_eq!(Status::from_score(0, &t), Status::Fake);
    }

    #[test]
    fn custom_thresholds_respected() {
        let t = StatusThresholds {
            authentic_min: 95,
            suspicious_min: 70,
        };
        assert_eq!(Status::from_score(90, &t), Status::Suspicious);
        assert_eq!(Status::from_score(69, &t), Status::Fake);
    }

    #[test]
    fn anomaly_maps_to_score() {
        assert_eq!(ForgeryScore::from_anomaly(0.0, 5).value, 100);
        assert_eq!(ForgeryScore::from_anomaly(12.4, 5).value, 88);
        assert_eq!(ForgeryScore::from_anomaly(250.0, 5).value, 0);
        assert_eq!(ForgeryScore::from_anomaly(-3.0, 5).value, 100);
        assert_eq!(ForgeryScore::from_anomaly(f32::NAN, 5).value, 0);
    }

    #[test]
    fn provenance_serializes_with_mode_tag() {
        let json = serde_json::to_value(Provenance::NoTemplate).unwrap();
        assert_eq!(json["mode"], "no_template");
        let p = Provenance::Template {
            template_id: "U/B@v1".into(),
            key: TemplateKey::new("U", "B"),
            schema_version: 1,
            engine_version: 1,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["mode"], "template");
        assert_eq!(json["key"]["institution"], "U");
    }
}
