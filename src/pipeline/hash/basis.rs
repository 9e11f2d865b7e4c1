//! Fixed random projection basis, derived from SHA-256 in counter mode.
//!
//! The basis is a pure function of the seed and the hash scheme version, so
//! every process on every machine projects onto the same hyperplanes.

use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use super::features::FEATURE_LEN;
use crate::models::{MorphHash, HASH_BITS, HASH_SCHEME_VERSION};

const BASIS_SEED: &[u8] = b"certimorph/morph-basis";

/// Uniform values per SHA-256 block.
const VALUES_PER_BLOCK: usize = 8;

static BASIS: LazyLock<Vec<f64>> =
    LazyLock::new(|| build_basis(HASH_SCHEME_VERSION, HASH_BITS, FEATURE_LEN));

/// `rows × cols` matrix, row-major, entries uniform in [-1, 1].
fn build_basis(version: u32, rows: usize, cols: usize) -> Vec<f64> {
    let mut basis = Vec::with_capacity(rows * cols);
    let blocks = cols.div_ceil(VALUES_PER_BLOCK);
    for row in 0..rows {
        for block in 0..blocks {
            let mut hasher = Sha256::new();
            hasher.update(BASIS_SEED);
            hasher.update(version.to_le_bytes());
            hasher.update((row as u32).to_le_bytes());
            hasher.update((block as u32).to_le_bytes());
            let digest = hasher.finalize();

            let take = VALUES_PER_BLOCK.min(cols - block * VALUES_PER_BLOCK);
            for chunk in digest.chunks_exact(4).take(take) {
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                basis.push(raw as f64 / u32::MAX as f64 * 2.0 - 1.0);
            }
        }
    }
    basis
}

/// One bit per basis row: set when the projection is non-negative.
pub fn project(features: &[f64]) -> MorphHash {
    let bits: Vec<bool> = BASIS
        .chunks_exact(FEATURE_LEN)
        .map(|row| {
            let dot: f64 = row.iter().zip(features).map(|(a, b)| a * b).sum();
            dot >= 0.0
        })
        .collect();
    MorphHash::from_bits(&bits, HASH_SCHEME_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_is_reproducible_and_bounded() {
        let a = build_basis(1, 4, 20);
        let b = build_basis(1, 4, 20);
        assert_eq!(a.len(), 80);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn version_changes_basis() {
        assert_ne!(build_basis(1, 2, 16), build_basis(2, 2, 16));
    }

    #[test]
    fn basis_is_roughly_centred() {
        let mean = BASIS.iter().sum::<f64>() / BASIS.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
        assert_eq!(BASIS.len(), HASH_BITS * FEATURE_LEN);
    }

    #[test]
    fn opposite_vectors_give_complementary_hashes() {
        let v: Vec<f64> = (0..FEATURE_LEN).map(|i| ((i * 37 % 11) as f64) - 5.0).collect();
        let neg: Vec<f64> = v.iter().map(|x| -x).collect();
        let d = project(&v).hamming(&project(&neg)).unwrap();
        assert!(d >= 250, "distance {d}");
    }

    #[test]
    fn small_perturbation_flips_few_bits() {
        let v: Vec<f64> = (0..FEATURE_LEN).map(|i| ((i * 37 % 11) as f64) - 5.0).collect();
        let nudged: Vec<f64> = v
            .iter()
            .enumerate()
            .map(|(i, x)| x + if i % 7 == 0 { 0.05 } else { 0.0 })
            .collect();
        let d = project(&v).hamming(&project(&nudged)).unwrap();
        assert!(d < 16, "distance {d}");
    }
}
