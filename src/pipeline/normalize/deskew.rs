//! Skew detection by projection profile and correction by rotation.
//!
//! Each ink pixel is projected onto the normal of a candidate line direction.
//! When the direction matches the dominant border/text-line angle, ink piles
//! up in few bins and the sum of squared bin counts peaks.

use image::{ImageBuffer, Pixel};
use tracing::debug;

/// Coarse search step (degrees).
const COARSE_STEP_DEG: f32 = 0.25;

/// Fine search step and half-span around the coarse winner (degrees).
const FINE_STEP_DEG: f32 = 0.05;
const FINE_STEPS: i32 = 6;

/// Below this share of ink pixels no angle is attempted.
const MIN_INK_FRACTION: f32 = 0.02;

/// Upper bound on projected pixels; larger ink sets are strided.
const MAX_SAMPLES: usize = 250_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewEstimate {
    /// Angle of the dominant lines, degrees, positive = descending to the right.
    pub angle_deg: f32,
    /// Peak projection energy over the mean across coarse candidates.
    pub peak_ratio: f32,
}

/// Estimate the dominant line angle within ±`max_deg`.
///
/// Returns `None` when the page is too small, has too little ink, or the
/// projection peak is not distinct enough to trust.
pub fn estimate_skew(
    img: &image::GrayImage,
    ink_threshold: u8,
    max_deg: f32,
    min_peak_ratio: f32,
) -> Option<SkewEstimate> {
    let (w, h) = (img.width(), img.height());
    if w < 50 || h < 50 {
        return None;
    }

    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let ink: Vec<(f32, f32)> = img
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] <= ink_threshold)
        .map(|(x, y, _)| (x as f32 - cx, y as f32 - cy))
        .collect();

    let total = w as usize * h as usize;
    if (ink.len() as f32 / total as f32) < MIN_INK_FRACTION {
        debug!(ink = ink.len(), total, "Too little ink for skew detection");
        return None;
    }

    let stride = ink.len().div_ceil(MAX_SAMPLES).max(1);
    let samples: Vec<(f32, f32)> = ink.into_iter().step_by(stride).collect();
    let half_diagonal = (cx * cx + cy * cy).sqrt().ceil() as usize + 1;

    let steps = (max_deg / COARSE_STEP_DEG).round() as i32;
    let coarse: Vec<(f32, f64)> = (-steps..=steps)
        .map(|i| {
            let angle = i as f32 * COARSE_STEP_DEG;
            (angle, projection_energy(&samples, angle, half_diagonal))
        })
        .collect();

    let mean = coarse.iter().map(|(_, e)| e).sum::<f64>() / coarse.len() as f64;
    let (coarse_angle, coarse_peak) = best_of(&coarse)?;
    let peak_ratio = if mean > 0.0 {
        (coarse_peak / mean) as f32
    } else {
        0.0
    };
    if peak_ratio < min_peak_ratio {
        debug!(peak_ratio, min_peak_ratio, "No reliable skew angle");
        return None;
    }

    let fine: Vec<(f32, f64)> = (-FINE_STEPS..=FINE_STEPS)
        .map(|j| coarse_angle + j as f32 * FINE_STEP_DEG)
        .filter(|a| a.abs() <= max_deg + f32::EPSILON)
        .map(|angle| (angle, projection_energy(&samples, angle, half_diagonal)))
        .collect();
    let (angle_deg, _) = best_of(&fine)?;

    debug!(angle_deg, peak_ratio, samples = samples.len(), "Skew estimated");
    Some(SkewEstimate {
        angle_deg,
        peak_ratio,
    })
}

/// Highest energy; ties go to the angle closest to zero.
fn best_of(candidates: &[(f32, f64)]) -> Option<(f32, f64)> {
    candidates.iter().copied().fold(None, |best, (angle, energy)| match best {
        None => Some((angle, energy)),
        Some((best_angle, best_energy)) => {
            if energy > best_energy || (energy == best_energy && angle.abs() < best_angle.abs()) {
                Some((angle, energy))
            } else {
                best
            }
        }
    })
}

fn projection_energy(samples: &[(f32, f32)], angle_deg: f32, half_diagonal: usize) -> f64 {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let mut bins = vec![0u32; 2 * half_diagonal + 1];
    let offset = half_diagonal as f32;
    for &(x, y) in samples {
        let r = y * cos - x * sin + offset;
        let idx = (r.round().max(0.0) as usize).min(bins.len() - 1);
        bins[idx] += 1;
    }
    bins.iter().map(|&b| (b as f64) * (b as f64)).sum()
}

/// Rotate about the centre with bilinear sampling. A line with slope
/// `tan(angle)` in the input becomes horizontal in the output; uncovered
/// pixels take `fill`.
pub fn rotate_about_center<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    angle_deg: f32,
    fill: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (cx, cy) = ((w - 1) as f32 / 2.0, (h - 1) as f32 / 2.0);
    let (max_x, max_y) = ((w - 1) as f32, (h - 1) as f32);
    let src: &[u8] = img;
    let fill = fill.channels().to_vec();
    let stride = w as usize * channels;
    let dst: &mut [u8] = &mut out;

    for v in 0..h as usize {
        let dv = v as f32 - cy;
        for u in 0..w as usize {
            let du = u as f32 - cx;
            let sx = cx + du * cos - dv * sin;
            let sy = cy + du * sin + dv * cos;
            let o = v * stride + u * channels;

            if !(0.0..=max_x).contains(&sx) || !(0.0..=max_y).contains(&sy) {
                dst[o..o + channels].copy_from_slice(&fill);
                continue;
            }

            let x0 = sx.floor() as usize;
            let y0 = sy.floor() as usize;
            let x1 = (x0 + 1).min(w as usize - 1);
            let y1 = (y0 + 1).min(h as usize - 1);
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for c in 0..channels {
                let at = |x: usize, y: usize| src[y * stride + x * channels + c] as f32;
                let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
                let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
                let value = top * (1.0 - fy) + bottom * fy;
                dst[o + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// White page with thick horizontal rules every 40 px.
    fn ruled_page() -> GrayImage {
        GrayImage::from_fn(600, 400, |x, y| {
            if (40..560).contains(&x) && y % 40 < 6 && (40..360).contains(&y) {
                Luma([20])
            } else {
                Luma([245])
            }
        })
    }

    #[test]
    fn straight_page_detects_zero() {
        let est = estimate_skew(&ruled_page(), 128, 5.0, 1.1).unwrap();
        assert!(est.angle_deg.abs() < 0.1, "angle {}", est.angle_deg);
        assert!(est.peak_ratio > 1.1);
    }

    #[test]
    fn detects_and_corrects_known_skew() {
        // rotate by -2 creates lines with slope tan(2deg)
        let skewed = rotate_about_center(&ruled_page(), -2.0, Luma([245]));
        let est = estimate_skew(&skewed, 128, 5.0, 1.1).unwrap();
        assert!((est.angle_deg - 2.0).abs() <= 0.5, "angle {}", est.angle_deg);

        let fixed = rotate_about_center(&skewed, est.angle_deg, Luma([245]));
        let again = estimate_skew(&fixed, 128, 5.0, 1.1).unwrap();
        assert!(again.angle_deg.abs() <= 0.5, "residual {}", again.angle_deg);
    }

    #[test]
    fn blank_page_has_no_angle() {
        let blank = GrayImage::from_pixel(300, 300, Luma([250]));
        assert!(estimate_skew(&blank, 128, 5.0, 1.1).is_none());
    }

    #[test]
    fn uniform_noise_is_not_reliable() {
        // Checkerboard-ish texture: every direction projects the same mass.
        let noise = GrayImage::from_fn(300, 300, |x, y| {
            if (x * 7 + y * 13) % 5 == 0 {
                Luma([10])
            } else {
                Luma([240])
            }
        });
        assert!(estimate_skew(&noise, 128, 5.0, 1.5).is_none());
    }

    #[test]
    fn zero_rotation_is_identity() {
        let page = ruled_page();
        assert_eq!(rotate_about_center(&page, 0.0, Luma([245])), page);
    }
}
