//! Feature vector behind the morph hash.
//!
//! Groups, in order:
//! - 16×16 block mean intensity
//! - 16×16 block edge energy (share of strong-gradient pixels)
//! - 16×16 block orientation balance (vertical minus horizontal gradient)
//! - global 8-bucket gradient orientation histogram
//! - one 4×4 occupancy grid per region kind
//!
//! Each group is standardised, scaled to unit length and weighted, so no
//! group dominates through its raw units or its length.

use image::GrayImage;

use crate::models::{RegionKind, ShapeProfile};

/// Blocks per axis.
pub const GRID: usize = 16;
const BLOCKS: usize = GRID * GRID;
const ORIENTATION_BUCKETS: usize = 8;
/// Cells per axis of the region occupancy grids.
const KIND_GRID: usize = 4;
const KIND_CELLS: usize = KIND_GRID * KIND_GRID;

/// |gx| + |gy| (central differences) at or above this is an edge pixel.
const EDGE_THRESHOLD: i32 = 60;

pub const FEATURE_LEN: usize =
    3 * BLOCKS + ORIENTATION_BUCKETS + RegionKind::ALL.len() * KIND_CELLS;

const MEAN_WEIGHT: f64 = 1.0;
const EDGE_WEIGHT: f64 = 1.0;
const BALANCE_WEIGHT: f64 = 1.0;
const HISTOGRAM_WEIGHT: f64 = 0.5;

/// Occupancy weight per kind: emblems are what forgers move.
fn kind_weight(kind: RegionKind) -> f64 {
    match kind {
        RegionKind::Seal => 2.0,
        RegionKind::Logo | RegionKind::Signature => 1.5,
        RegionKind::TextBlock | RegionKind::Border => 1.0,
    }
}

#[derive(Debug, Clone, Default)]
struct BlockStats {
    pixels: u64,
    gray_sum: u64,
    edges: u64,
    balance: i64,
}

pub fn feature_vector(profile: &ShapeProfile, gray: &GrayImage) -> Vec<f64> {
    let (blocks, histogram) = pixel_statistics(gray);

    let mut means: Vec<f64> = blocks
        .iter()
        .map(|b| b.gray_sum as f64 / (255.0 * b.pixels.max(1) as f64))
        .collect();
    let mut edges: Vec<f64> = blocks
        .iter()
        .map(|b| b.edges as f64 / b.pixels.max(1) as f64)
        .collect();
    let mut balance: Vec<f64> = blocks
        .iter()
        .map(|b| b.balance as f64 / (510.0 * b.pixels.max(1) as f64))
        .collect();
    let total_edges: u64 = histogram.iter().sum();
    let mut hist: Vec<f64> = histogram
        .iter()
        .map(|&c| c as f64 / total_edges.max(1) as f64)
        .collect();

    standardize(&mut means, MEAN_WEIGHT);
    standardize(&mut edges, EDGE_WEIGHT);
    standardize(&mut balance, BALANCE_WEIGHT);
    standardize(&mut hist, HISTOGRAM_WEIGHT);

    let mut features = Vec::with_capacity(FEATURE_LEN);
    features.extend(means);
    features.extend(edges);
    features.extend(balance);
    features.extend(hist);
    for kind in RegionKind::ALL {
        let mut grid = occupancy(profile, kind);
        standardize(&mut grid, kind_weight(kind));
        features.extend(grid);
    }
    features
}

fn pixel_statistics(gray: &GrayImage) -> (Vec<BlockStats>, [u64; ORIENTATION_BUCKETS]) {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut blocks = vec![BlockStats::default(); BLOCKS];
    let mut histogram = [0u64; ORIENTATION_BUCKETS];
    if w == 0 || h == 0 {
        return (blocks, histogram);
    }
    let at = |x: usize, y: usize| gray.get_pixel(x as u32, y as u32).0[0] as i32;

    for y in 0..h {
        let by = y * GRID / h;
        let (up, down) = (y.saturating_sub(1), (y + 1).min(h - 1));
        for x in 0..w {
            let block = &mut blocks[by * GRID + x * GRID / w];
            let v = at(x, y);
            block.pixels += 1;
            block.gray_sum += v as u64;

            let gx = at((x + 1).min(w - 1), y) - at(x.saturating_sub(1), y);
            let gy = at(x, down) - at(x, up);
            if gx.abs() + gy.abs() < EDGE_THRESHOLD {
                continue;
            }
            block.edges += 1;
            block.balance += (gy.abs() - gx.abs()) as i64;

            let mut angle = (gy as f64).atan2(gx as f64);
            if angle < 0.0 {
                angle += std::f64::consts::PI;
            }
            let bucket = (angle / std::f64::consts::PI * ORIENTATION_BUCKETS as f64) as usize;
            histogram[bucket.min(ORIENTATION_BUCKETS - 1)] += 1;
        }
    }
    (blocks, histogram)
}

/// Share of each 4×4 cell covered by regions of `kind`, capped at 1.
fn occupancy(profile: &ShapeProfile, kind: RegionKind) -> Vec<f64> {
    let mut grid = vec![0.0f64; KIND_CELLS];
    let cell = 1.0 / KIND_GRID as f64;
    for (_, region) in profile.regions_of(kind) {
        let b = profile.norm_box(region);
        let (x0, y0) = (b.x as f64, b.y as f64);
        let (x1, y1) = (x0 + b.width as f64, y0 + b.height as f64);
        for cy in 0..KIND_GRID {
            let oy = (y1.min((cy + 1) as f64 * cell) - y0.max(cy as f64 * cell)).max(0.0);
            if oy == 0.0 {
                continue;
            }
            for cx in 0..KIND_GRID {
                let ox = (x1.min((cx + 1) as f64 * cell) - x0.max(cx as f64 * cell)).max(0.0);
                grid[cy * KIND_GRID + cx] += ox * oy / (cell * cell);
            }
        }
    }
    for v in &mut grid {
        *v = v.min(1.0);
    }
    grid
}

/// Zero mean, unit length, times `weight`. Constant groups become zeros.
fn standardize(values: &mut [f64], weight: f64) {
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if variance <= 1e-18 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    values.iter_mut().for_each(|v| *v -= mean);
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    values.iter_mut().for_each(|v| *v *= weight / norm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BoundingBox, LogoIntegrity, Region, SealPosition, ShapeSummary, TextAlignment,
    };
    use image::Luma;

    fn profile_with(regions: Vec<Region>) -> ShapeProfile {
        ShapeProfile {
            page_width: 400,
            page_height: 400,
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

    fn page() -> GrayImage {
        GrayImage::from_fn(400, 400, |x, y| {
            if (100..300).contains(&x) && (190..210).contains(&y) {
                Luma([20])
            } else {
                Luma([245])
            }
        })
    }

    #[test]
    fn vector_has_fixed_length() {
        let v = feature_vector(&profile_with(vec![]), &page());
        assert_eq!(v.len(), FEATURE_LEN);
        assert_eq!(FEATURE_LEN, 856);
    }

    #[test]
    fn groups_are_unit_weighted() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        standardize(&mut values, 2.0);
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 2.0).abs() < 1e-9);
        assert!(values.iter().sum::<f64>().abs() < 1e-9);
    }

    #[test]
    fn constant_group_is_silent() {
        let mut values = vec![0.3; 16];
        standardize(&mut values, 1.0);
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn occupancy_covers_exact_cells() {
        let seal = Region::new(RegionKind::Seal, BoundingBox::new(0, 0, 100, 100), 0.0, 0.9);
        let grid = occupancy(&profile_with(vec![seal]), RegionKind::Seal);
        assert!((grid[0] - 1.0).abs() < 1e-9);
        assert!(grid[1..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn horizontal_bar_fills_vertical_gradient_buckets() {
        let (blocks, hist) = pixel_statistics(&page());
        // rows 189..=190 and 209..=210 carry the strong edges, angle ±90°
        let vertical = hist[ORIENTATION_BUCKETS / 2];
        assert!(vertical > 0);
        assert!(vertical >= hist.iter().sum::<u64>() / 2);
        assert!(blocks.iter().any(|b| b.balance > 0));
    }

    #[test]
    fn feature_vector_is_deterministic() {
        let seal = Region::new(RegionKind::Seal, BoundingBox::new(50, 50, 60, 60), 0.0, 0.9);
        let p = profile_with(vec![seal]);
        assert_eq!(feature_vector(&p, &page()), feature_vector(&p, &page()));
    }
}
