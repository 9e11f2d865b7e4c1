use base64::Engine;
use image::{DynamicImage, GrayImage};
use sha2::{Digest, Sha256};

/// SHA-256 of the submitted bytes, base64.
pub fn input_digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Perceptual hash of the normalized raster.
/// Uses DoubleGradient algorithm (256-bit hash) for near-duplicate detection.
pub fn raster_fingerprint(gray: &GrayImage) -> String {
    let hasher = img_hash::HasherConfig::new()
        .hash_alg(img_hash::HashAlg::DoubleGradient)
        .hash_size(16, 16)
        .to_hasher();

    let hash = hasher.hash_image(&DynamicImage::ImageLuma8(gray.clone()));
    hash.to_base64()
}

/// Compare two raster fingerprints and return similarity score (0.0-1.0)
pub fn fingerprint_similarity(a: &str, b: &str) -> Option<f64> {
    let a = img_hash::ImageHash::<Vec<u8>>::from_base64(a).ok()?;
    let b = img_hash::ImageHash::<Vec<u8>>::from_base64(b).ok()?;

    let distance = a.dist(&b);
    let max_bits = (a.as_bytes().len() * 8).max(1) as f64;
    Some(1.0 - (distance as f64 / max_bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{render_certificate, CertificateSpec};
    use image::Luma;

    #[test]
    fn digest_deterministic_and_content_sensitive() {
        assert_eq!(input_digest(b"certificate"), input_digest(b"certificate"));
        assert_ne!(input_digest(b"certificate A"), input_digest(b"certificate B"));
        assert_eq!(input_digest(b"").len(), 44);
    }

    #[test]
    fn identical_rasters_have_perfect_similarity() {
        let page = render_certificate(&CertificateSpec::default());
        let fp = raster_fingerprint(&page);
        let similarity = fingerprint_similarity(&fp, &fp).unwrap();
        assert!((similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn different_layouts_are_less_similar() {
        let page = raster_fingerprint(&render_certificate(&CertificateSpec::default()));
        let blank = raster_fingerprint(&GrayImage::from_fn(1169, 826, |x, _| {
            Luma([(x % 256) as u8])
        }));
        let similarity = fingerprint_similarity(&page, &blank).unwrap();
        assert!(similarity < 0.97, "similarity {similarity}");
    }

    #[test]
    fn malformed_fingerprint_is_none() {
        assert!(fingerprint_similarity("not base64!!", "also not").is_none());
    }
}
