//! Validation pipeline stages.
//!
//! Pipeline flow:
//! 1. `normalize`: bytes → canonical `RasterDocument`
//! 2. `extract`: raster → `ShapeProfile`
//! 3. `hash` ‖ template lookup: profile + raster → `MorphHash`
//! 4. `score`: profile + hash + optional template → score and zones
//! 5. `assemble`: everything → `ValidationReport`
//!
//! Every stage is a synchronous pure function; scheduling, deadlines and
//! cancellation live in `crate::engine`.

pub mod assemble;
pub mod extract;
pub mod hash;
pub mod normalize;
pub mod score;

use tracing::error;

use crate::error::EngineError;
use crate::models::ShapeProfile;

/// Verify the profile invariants before anything downstream consumes it.
/// A violation is an engine bug, never a property of the input.
pub fn check_profile(profile: &ShapeProfile, overlap_tolerance: f32) -> Result<(), EngineError> {
    profile.check_invariants(overlap_tolerance).map_err(|detail| {
        error!(%detail, regions = profile.regions.len(), "Shape profile invariant violated");
        EngineError::InternalInvariant(detail)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BoundingBox, LogoIntegrity, Region, RegionKind, SealPosition, ShapeSummary,
        TextAlignment,
    };

    fn profile(regions: Vec<Region>) -> ShapeProfile {
        ShapeProfile {
            page_width: 100,
            page_height: 100,
            regions,
            layout_score: 50.0,
            summary: ShapeSummary {
                seal_position: SealPosition::Absent,
                text_alignment: TextAlignment::Absent,
                logo_integrity: LogoIntegrity::Absent,
            },
            diagnostics: vec![],
        }
    }

    #[test]
    fn valid_profile_passes() {
        let p = profile(vec![Region::new(
            RegionKind::Seal,
            BoundingBox::new(10, 10, 20, 20),
            0.0,
            0.8,
        )]);
        assert!(check_profile(&p, 0.1).is_ok());
    }

    #[test]
    fn out_of_bounds_region_is_internal_invariant() {
        let p = profile(vec![Region::new(
            RegionKind::Seal,
            BoundingBox::new(90, 90, 20, 20),
            0.0,
            0.8,
        )]);
        let err = check_profile(&p, 0.1).unwrap_err();
        assert!(matches!(err, EngineError::InternalInvariant(_)));
        assert_eq!(err.code(), "internal_invariant_error");
    }
}
