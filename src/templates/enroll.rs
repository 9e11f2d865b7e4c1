//! Template enrollment from a known-good scan.

use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{
    DeclaredFormat, Template, TemplateKey, ToleranceSet, HASH_SCHEME_VERSION,
    TEMPLATE_SCHEMA_VERSION,
};
use crate::pipeline::{check_profile, extract::extract, hash::morph_hash, normalize::normalize};

/// Run normalize → extract → hash on a genuine certificate and package the
/// result as a template with default tolerances.
pub fn enroll_template(
    bytes: &[u8],
    format: DeclaredFormat,
    key: TemplateKey,
    config: &EngineConfig,
) -> Result<Template, EngineError> {
    let doc = normalize(bytes, format, &config.normalizer)?;
    let profile = extract(&doc, &config.extractor);
    check_profile(&profile, config.extractor.overlap_tolerance)?;
    let reference_hash = morph_hash(&profile, &doc);

    info!(
        key = %key,
        regions = profile.regions.len(),
        layout_score = profile.layout_score,
        low_confidence = doc.low_confidence_normalization(),
        "Template enrolled"
    );

    Ok(Template {
        key,
        reference_profile: profile,
        reference_hash,
        tolerances: ToleranceSet::default(),
        schema_version: TEMPLATE_SCHEMA_VERSION,
        engine_version: HASH_SCHEME_VERSION,
    })
}
