use serde::{Deserialize, Serialize};

use super::enums::RegionKind;
use super::geometry::BoundingBox;

/// One detected layout primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    pub bbox: BoundingBox,
    /// Principal-axis angle in degrees, (-90, 90].
    pub orientation_deg: f32,
    /// Strength of the geometric signal, 0.0-1.0.
    pub confidence: f32,
}

impl Region {
    pub fn new(kind: RegionKind, bbox: BoundingBox, orientation_deg: f32, confidence: f32) -> Self {
        Self {
            kind,
            bbox,
            orientation_deg,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Deterministic ordering: kind, then reading order.
    pub fn sort_key(&self) -> (RegionKind, u32, u32, u32, u32) {
        (
            self.kind,
            self.bbox.y,
            self.bbox.x,
            self.bbox.height,
            self.bbox.width,
        )
    }
}
