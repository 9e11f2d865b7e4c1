//! Grayscale conversion, global thresholding, local contrast equalization and
//! page quality checks.

use image::{GrayImage, Luma, RgbImage};

use crate::models::NormalizationWarning;

/// Near-white cut-off for the blank-page check.
const WHITE_LEVEL: u8 = 240;

/// Share of near-white pixels above which the page counts as blank.
/// Certificates are mostly paper, so this sits well above the usual 95%.
const BLANK_FRACTION: f32 = 0.99;

/// Near-black cut-off for the dark-page check.
const DARK_LEVEL: u8 = 15;

/// RMS contrast below this = poor contrast (near-uniform image).
const CONTRAST_THRESHOLD: f32 = 25.0;

/// Convert RGB image to grayscale using ITU-R BT.601 luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }
    gray
}

pub fn histogram(img: &GrayImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    hist
}

/// Otsu's global threshold. Pixels `<= threshold` are ink.
///
/// When a range of thresholds separates the classes equally well (clean
/// bimodal scans), the middle of that range is returned.
pub fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 127;
    }
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0.0f64;
    let mut best = 0.0f64;
    let mut first = None;
    let mut last = 0usize;

    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count as u64;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let between = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);

        let tolerance = best * 1e-9;
        if between > best + tolerance {
            best = between;
            first = Some(t);
            last = t;
        } else if first.is_some() && (between - best).abs() <= tolerance {
            last = t;
        }
    }

    match first {
        Some(first) => ((first + last) / 2) as u8,
        None => 127,
    }
}

/// Tile-based clipped histogram equalization with bilinear blending between
/// neighbouring tile mappings.
pub fn equalize_local(img: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return img.clone();
    }
    let tiles_x = tiles.clamp(1, w);
    let tiles_y = tiles.clamp(1, h);
    let x_bounds = tile_bounds(w, tiles_x);
    let y_bounds = tile_bounds(h, tiles_y);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y as usize {
        for tx in 0..tiles_x as usize {
            let mut hist = [0u32; 256];
            for y in y_bounds[ty]..y_bounds[ty + 1] {
                for x in x_bounds[tx]..x_bounds[tx + 1] {
                    hist[img.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            luts.push(clipped_mapping(&hist, clip_limit));
        }
    }

    let x_weights = interpolation_weights(&x_bounds, w);
    let y_weights = interpolation_weights(&y_bounds, h);
    let lut = |tx: usize, ty: usize| &luts[ty * tiles_x as usize + tx];

    let mut out = GrayImage::new(w, h);
    for (y, &(ty0, ty1, wy)) in y_weights.iter().enumerate() {
        for (x, &(tx0, tx1, wx)) in x_weights.iter().enumerate() {
            let v = img.get_pixel(x as u32, y as u32).0[0] as usize;
            let top = lut(tx0, ty0)[v] * (1.0 - wx) + lut(tx1, ty0)[v] * wx;
            let bottom = lut(tx0, ty1)[v] * (1.0 - wx) + lut(tx1, ty1)[v] * wx;
            let value = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn tile_bounds(len: u32, tiles: u32) -> Vec<u32> {
    (0..=tiles)
        .map(|i| (i as u64 * len as u64 / tiles as u64) as u32)
        .collect()
}

/// For every coordinate: the two tiles whose centres bracket it and the
/// weight of the second.
fn interpolation_weights(bounds: &[u32], len: u32) -> Vec<(usize, usize, f32)> {
    let centers: Vec<f32> = bounds
        .windows(2)
        .map(|b| (b[0] + b[1]) as f32 / 2.0)
        .collect();
    let last = centers.len() - 1;

    (0..len)
        .map(|p| {
            let p = p as f32 + 0.5;
            if p <= centers[0] {
                return (0, 0, 0.0);
            }
            if p >= centers[last] {
                return (last, last, 0.0);
            }
            let i = centers.partition_point(|&c| c <= p) - 1;
            let span = centers[i + 1] - centers[i];
            (i, i + 1, (p - centers[i]) / span)
        })
        .collect()
}

fn clipped_mapping(hist: &[u32; 256], clip_limit: f32) -> [f32; 256] {
    let n: u32 = hist.iter().sum();
    let mut map = [0.0f32; 256];
    if n == 0 {
        return map;
    }
    let clip = ((clip_limit * n as f32 / 256.0) as u32).max(1);

    let mut clipped = *hist;
    let mut excess = 0u32;
    for bin in clipped.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in clipped.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut cdf = 0u32;
    for (v, &count) in clipped.iter().enumerate() {
        cdf += count;
        map[v] = 255.0 * cdf as f32 / n as f32;
    }
    map
}

/// Compute RMS contrast: the standard deviation of grayscale pixel intensities.
pub fn compute_contrast_score(img: &GrayImage) -> f32 {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for pixel in img.pixels() {
        let val = pixel.0[0] as f64;
        sum += val;
        sum_sq += val * val;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    variance.max(0.0).sqrt() as f32
}

/// Blank, dark and low-contrast checks. Warnings never stop the pipeline:
/// a blank page still yields a (structureless) profile.
pub fn assess_quality(img: &GrayImage) -> Vec<NormalizationWarning> {
    let mut warnings = Vec::new();
    let pixel_count = img.width() as usize * img.height() as usize;
    if pixel_count == 0 {
        return warnings;
    }

    let white = img.pixels().filter(|p| p.0[0] > WHITE_LEVEL).count();
    let is_blank = white as f32 / pixel_count as f32 > BLANK_FRACTION;
    if is_blank {
        warnings.push(NormalizationWarning::BlankPage);
    }

    let dark = img.pixels().filter(|p| p.0[0] < DARK_LEVEL).count();
    let is_dark = dark as f32 / pixel_count as f32 > 0.80;
    if is_dark {
        warnings.push(NormalizationWarning::DarkPage);
    }

    if !is_blank && !is_dark && compute_contrast_score(img) < CONTRAST_THRESHOLD {
        warnings.push(NormalizationWarning::LowContrast);
    }
    warnings
}
