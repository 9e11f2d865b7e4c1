use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::enums::RegionKind;
use super::morph_hash::{MorphHash, HASH_SCHEME_VERSION};
use super::profile::ShapeProfile;
use crate::error::EngineError;

/// Version of the on-disk template layout.
pub const TEMPLATE_SCHEMA_VERSION: u32 = 1;

/// Institution plus certificate type: the unit of template lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    pub institution: String,
    pub certificate_type: String,
}

impl TemplateKey {
    pub fn new(institution: impl Into<String>, certificate_type: impl Into<String>) -> Self {
        Self {
            institution: institution.into(),
            certificate_type: certificate_type.into(),
        }
    }

    /// Filesystem-safe name: lowercase alphanumerics, everything else `-`,
    /// plus a short digest of the exact key so distinct keys that slug alike
    /// never share a file.
    pub fn file_stem(&self) -> String {
        fn slug(s: &str) -> String {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_lowercase()
                    } else {
                        '-'
                    }
                })
                .collect()
        }
        let mut hasher = Sha256::new();
        hasher.update(self.institution.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.certificate_type.as_bytes());
        let tag: String = hasher.finalize()[..4]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        format!(
            "{}__{}-{tag}",
            slug(&self.institution),
            slug(&self.certificate_type)
        )
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.institution, self.certificate_type)
    }
}

/// How far an observed region may drift from its reference before it counts
/// as deviating by one unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionTolerance {
    /// Centre displacement, page units.
    pub position: f32,
    /// Absolute log area ratio.
    pub size: f32,
    /// Confidence drop below the reference.
    pub confidence: f32,
}

impl RegionTolerance {
    pub const fn new(position: f32, size: f32, confidence: f32) -> Self {
        Self {
            position,
            size,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceSet {
    pub text_block: RegionTolerance,
    pub seal: RegionTolerance,
    pub logo: RegionTolerance,
    pub border: RegionTolerance,
    pub signature: RegionTolerance,
}

impl ToleranceSet {
    pub fn get(&self, kind: RegionKind) -> RegionTolerance {
        match kind {
            RegionKind::TextBlock => self.text_block,
            RegionKind::Seal => self.seal,
            RegionKind::Logo => self.logo,
            RegionKind::Border => self.border,
            RegionKind::Signature => self.signature,
        }
    }
}

impl Default for ToleranceSet {
    fn default() -> Self {
        Self {
            text_block: RegionTolerance::new(0.04, 0.6, 0.4),
            seal: RegionTolerance::new(0.03, 0.35, 0.35),
            logo: RegionTolerance::new(0.03, 0.35, 0.35),
            border: RegionTolerance::new(0.02, 0.15, 0.35),
            signature: RegionTolerance::new(0.04, 0.5, 0.4),
        }
    }
}

/// Known-good reference for one institution and certificate type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub key: TemplateKey,
    pub reference_profile: ShapeProfile,
    pub reference_hash: MorphHash,
    #[serde(default)]
    pub tolerances: ToleranceSet,
    pub schema_version: u32,
    /// Hash scheme version the reference data was produced with.
    pub engine_version: u32,
}

impl Template {
    pub fn id(&self) -> String {
        format!("{}@v{}", self.key, self.schema_version)
    }

    /// Refuse templates produced by another hash scheme, or whose reference
    /// profile breaks the profile invariants (regions off the page, non-finite
    /// confidences, out-of-order regions). Reference overlap was settled by
    /// the extractor at enrollment and is not judged again.
    pub fn ensure_compatible(&self) -> Result<(), EngineError> {
        for found in [self.engine_version, self.reference_hash.version()] {
            if found != HASH_SCHEME_VERSION {
                return Err(EngineError::VersionMismatch {
                    expected: HASH_SCHEME_VERSION,
                    found,
                });
            }
        }
        self.reference_profile.check_invariants(1.0).map_err(|detail| {
            EngineError::InternalInvariant(format!("template {}: {detail}", self.id()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_is_filesystem_safe() {
        let key = TemplateKey::new("Univ. of Lagos", "B.Sc/Hons");
        assert_eq!(key.file_stem(), "univ--of-lagos__b-sc-hons-70649045");
        assert_eq!(key.to_string(), "Univ. of Lagos/B.Sc/Hons");
    }

    #[test]
    fn keys_that_slug_alike_get_distinct_stems() {
        let dotted = TemplateKey::new("Univ. of X", "Diploma");
        let spaced = TemplateKey::new("Univ  of X", "Diploma");
        assert_ne!(dotted.file_stem(), spaced.file_stem());
        assert!(dotted.file_stem().starts_with("univ--of-x__diploma-"));
        assert_eq!(dotted.file_stem(), dotted.clone().file_stem());
    }

    #[test]
    fn emblem_tolerances_tighter_than_text() {
        let t = ToleranceSet::default();
        assert!(t.get(RegionKind::Seal).position < t.get(RegionKind::TextBlock).position);
        assert!(t.get(RegionKind::Logo).size < t.get(RegionKind::TextBlock).size);
    }

    #[test]
    fn partial_tolerances_take_defaults() {
        let t: ToleranceSet = serde_json::from_str(
            r#"{ "seal": { "position": 0.1, "size": 0.5, "confidence": 0.5 } }"#,
        )
        .unwrap();
        assert!((t.seal.position - 0.1).abs() < f32::EPSILON);
        assert_eq!(t.logo, ToleranceSet::default().logo);
    }
}
