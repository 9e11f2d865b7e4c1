//! Morph Hash Generator: profile + raster in, 256-bit `MorphHash` out.
//!
//! Pipeline flow:
//! 1. Block statistics over a fixed 16×16 grid of the normalized raster
//! 2. Region occupancy encodings from the shape profile
//! 3. Per-group standardisation and weighting
//! 4. Signs of projections onto the versioned basis
//!
//! Documented distance bounds for the current scheme (default normalizer):
//! re-scans within ±2° and re-encodes at JPEG quality ≥ 90 stay below
//! [`STABLE_DISTANCE`]; moving a seal to another quadrant exceeds
//! [`DISTINCT_DISTANCE`].

pub mod basis;
pub mod features;
pub mod fingerprint;

use tracing::debug;

use crate::models::{MorphHash, ShapeProfile};
use crate::pipeline::normalize::RasterDocument;

pub use fingerprint::{fingerprint_similarity, input_digest, raster_fingerprint};

/// Upper bound on the Hamming distance between noisy re-scans of one document.
pub const STABLE_DISTANCE: u32 = 32;

/// Lower bound on the Hamming distance after a structural change.
pub const DISTINCT_DISTANCE: u32 = 48;

pub fn morph_hash(profile: &ShapeProfile, doc: &RasterDocument) -> MorphHash {
    let features = features::feature_vector(profile, doc.gray());
    let hash = basis::project(&features);
    debug!(
        version = hash.version(),
        regions = profile.regions.len(),
        "Morph hash computed"
    );
    hash
}
