use serde::{Deserialize, Serialize};

use super::enums::{LogoIntegrity, ProfileDiagnostic, RegionKind, SealPosition, TextAlignment};
use super::geometry::NormBox;
use super::region::Region;

/// Structured layout of one document, as produced by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeProfile {
    /// Raster dimensions the region boxes refer to.
    pub page_width: u32,
    pub page_height: u32,
    /// Sorted by kind, then top-to-bottom, then left-to-right.
    pub regions: Vec<Region>,
    /// Structural plausibility, 0-100.
    pub layout_score: f32,
    pub summary: ShapeSummary,
    #[serde(default)]
    pub diagnostics: Vec<ProfileDiagnostic>,
}

/// Human-facing digest of the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSummary {
    pub seal_position: SealPosition,
    pub text_alignment: TextAlignment,
    pub logo_integrity: LogoIntegrity,
}

impl ShapeProfile {
    pub fn regions_of(&self, kind: RegionKind) -> impl Iterator<Item = (usize, &Region)> {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.kind == kind)
    }

    pub fn count_of(&self, kind: RegionKind) -> usize {
        self.regions.iter().filter(|r| r.kind == kind).count()
    }

    pub fn norm_box(&self, region: &Region) -> NormBox {
        region.bbox.normalized(self.page_width, self.page_height)
    }

    pub fn has_diagnostic(&self, diagnostic: ProfileDiagnostic) -> bool {
        self.diagnostics.contains(&diagnostic)
    }

    /// Verify the data-model invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self, overlap_tolerance: f32) -> Result<(), String> {
        if self.page_width == 0 || self.page_height == 0 {
            return Err("profile has an empty page".into());
        }
        if !self.layout_score.is_finite() || !(0.0..=100.0).contains(&self.layout_score) {
            return Err(format!("layout score {} outside 0..=100", self.layout_score));
        }

        for (i, region) in self.regions.iter().enumerate() {
            if !region.bbox.fits_within(self.page_width, self.page_height) {
                return Err(format!(
                    "{} region #{i} {:?} outside {}x{} page",
                    region.kind, region.bbox, self.page_width, self.page_height
                ));
            }
            if !region.confidence.is_finite() || !(0.0..=1.0).contains(&region.confidence) {
                return Err(format!(
                    "{} region #{i} has confidence {}",
                    region.kind, region.confidence
                ));
            }
            if !region.orientation_deg.is_finite() {
                return Err(format!("{} region #{i} has non-finite orientation", region.kind));
            }
        }

        for pair in self.regions.windows(2) {
            if pair[0].sort_key() > pair[1].sort_key() {
                return Err("regions are not in canonical order".into());
            }
        }

        for (i, a) in self.regions.iter().enumerate() {
            for b in self.regions.iter().skip(i + 1).filter(|b| b.kind == a.kind) {
                let overlap = a.bbox.overlap_fraction(&b.bbox);
                if overlap > overlap_tolerance {
                    return Err(format!(
                        "{} regions {:?} and {:?} overlap by {:.2}",
                        a.kind, a.bbox, b.bbox, overlap
                    ));
                }
            }
        }
        Ok(())
    }
}
