//! 8-connected components of the merged mask, with shape statistics taken
//! from the original ink inside each component.

use image::GrayImage;

use super::binarize::InkMask;
use crate::models::BoundingBox;

/// One connected blob and the measurements the classifier needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Tight box around the component's ink.
    pub bbox: BoundingBox,
    /// Box around the dilated blob.
    pub merged_bbox: BoundingBox,
    pub ink_count: u64,
    pub merged_count: u64,
    /// Principal axis from second-order moments, degrees in (-90, 90].
    pub orientation_deg: f32,
    /// 1.0 = all ink inside the inscribed ellipse, 0.0 = corners as dense as the middle.
    pub roundness: f32,
    /// Share of ink with a mirrored partner, averaged over both axes.
    pub symmetry: f32,
    /// Ink/paper separation, 0.0-1.0.
    pub contrast: f32,
}

impl Component {
    /// Ink density inside the tight box.
    pub fn fill(&self) -> f32 {
        self.ink_count as f32 / self.bbox.area().max(1) as f32
    }

    /// Dilated-blob density inside its own box. High for text lines,
    /// low for strokes such as signatures.
    pub fn merged_fill(&self) -> f32 {
        self.merged_count as f32 / self.merged_bbox.area().max(1) as f32
    }
}

#[derive(Debug, Clone)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u64,
}

impl Extent {
    fn new() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            count: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.count += 1;
    }

    fn bbox(&self) -> BoundingBox {
        BoundingBox::from_extremes(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

#[derive(Debug, Clone, Default)]
struct Moments {
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
    gray_sum: u64,
}

#[derive(Debug, Clone, Default)]
struct ShapeCounts {
    inner: u64,
    corner: u64,
    mirrored: u64,
}

/// Label `merged` and measure every component. Output follows first-seen
/// raster order, which is deterministic for a given mask.
pub fn find_components(gray: &GrayImage, ink: &InkMask, merged: &InkMask) -> Vec<Component> {
    let (labels, n) = label(merged);
    if n == 0 {
        return Vec::new();
    }
    let (w, h) = (merged.width(), merged.height());

    let mut blob = vec![Extent::new(); n];
    let mut tight = vec![Extent::new(); n];
    let mut moments = vec![Moments::default(); n];

    for y in 0..h {
        for x in 0..w {
            let l = labels[merged.index(x, y)];
            if l == 0 {
                continue;
            }
            let c = (l - 1) as usize;
            blob[c].add(x, y);
            if ink.get(x, y) {
                tight[c].add(x, y);
                let m = &mut moments[c];
                let (fx, fy) = (x as f64, y as f64);
                m.sx += fx;
                m.sy += fy;
                m.sxx += fx * fx;
                m.syy += fy * fy;
                m.sxy += fx * fy;
                m.gray_sum += gray.get_pixel(x, y).0[0] as u64;
            }
        }
    }

    let mut shape = vec![ShapeCounts::default(); n];
    for y in 0..h {
        for x in 0..w {
            let l = labels[merged.index(x, y)];
            if l == 0 || !ink.get(x, y) {
                continue;
            }
            let c = (l - 1) as usize;
            let t = &tight[c];
            let counts = &mut shape[c];

            let half_w = (t.max_x - t.min_x + 1) as f64 / 2.0;
            let half_h = (t.max_y - t.min_y + 1) as f64 / 2.0;
            let nx = (x as f64 + 0.5 - (t.min_x as f64 + half_w)) / half_w;
            let ny = (y as f64 + 0.5 - (t.min_y as f64 + half_h)) / half_h;
            if nx * nx + ny * ny <= 1.0 {
                counts.inner += 1;
            } else {
                counts.corner += 1;
            }

            let mx = t.min_x + t.max_x - x;
            let my = t.min_y + t.max_y - y;
            let partner = |px: u32, py: u32| ink.get(px, py) && labels[merged.index(px, py)] == l;
            counts.mirrored += u64::from(partner(mx, y)) + u64::from(partner(x, my));
        }
    }

    let integral = IntegralImage::new(gray);
    (0..n)
        .filter(|&c| tight[c].count > 0)
        .map(|c| {
            let bbox = tight[c].bbox();
            let merged_bbox = blob[c].bbox();
            let ink_count = tight[c].count;
            Component {
                bbox,
                merged_bbox,
                ink_count,
                merged_count: blob[c].count,
                orientation_deg: orientation(&moments[c], ink_count),
                roundness: roundness(&shape[c], &bbox),
                symmetry: shape[c].mirrored as f32 / (2 * ink_count) as f32,
                contrast: contrast(&integral, &merged_bbox, &moments[c], ink_count),
            }
        })
        .collect()
}

fn label(mask: &InkMask) -> (Vec<u32>, usize) {
    let (w, h) = (mask.width(), mask.height());
    let mut labels = vec![0u32; w as usize * h as usize];
    let mut next = 0u32;
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = mask.index(x, y);
            if !mask.get(x, y) || labels[i] != 0 {
                continue;
            }
            next += 1;
            labels[i] = next;
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                let (x0, x1) = (cx.saturating_sub(1), (cx + 1).min(w - 1));
                let (y0, y1) = (cy.saturating_sub(1), (cy + 1).min(h - 1));
                for ny in y0..=y1 {
                    for nx in x0..=x1 {
                        let j = mask.index(nx, ny);
                        if mask.get(nx, ny) && labels[j] == 0 {
                            labels[j] = next;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    (labels, next as usize)
}

fn orientation(m: &Moments, count: u64) -> f32 {
    let n = count as f64;
    let (mx, my) = (m.sx / n, m.sy / n);
    let mu20 = m.sxx / n - mx * mx;
    let mu02 = m.syy / n - my * my;
    let mu11 = m.sxy / n - mx * my;
    let deg = (0.5 * (2.0 * mu11).atan2(mu20 - mu02)).to_degrees() as f32;
    if deg <= -90.0 {
        deg + 180.0
    } else {
        deg
    }
}

fn roundness(counts: &ShapeCounts, bbox: &BoundingBox) -> f32 {
    let area = bbox.area() as f64;
    let ellipse = std::f64::consts::FRAC_PI_4 * area;
    let corners = area - ellipse;
    let inner_density = counts.inner as f64 / ellipse;
    if inner_density <= 0.0 {
        return 0.0;
    }
    let corner_density = counts.corner as f64 / corners;
    (1.0 - corner_density / inner_density).clamp(0.0, 1.0) as f32
}

fn contrast(integral: &IntegralImage, merged_bbox: &BoundingBox, m: &Moments, ink: u64) -> f32 {
    let ink_mean = m.gray_sum as f64 / ink as f64;
    let area = merged_bbox.area();
    let paper_mean = if area > ink {
        (integral.sum(merged_bbox) - m.gray_sum) as f64 / (area - ink) as f64
    } else {
        255.0
    };
    ((paper_mean - ink_mean) / 255.0).clamp(0.0, 1.0) as f32
}

/// Summed-area table over the gray raster.
struct IntegralImage {
    width: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                row += gray.get_pixel(x as u32, y as u32).0[0] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { width: w, sums }
    }

    fn sum(&self, b: &BoundingBox) -> u64 {
        let stride = self.width + 1;
        let (x0, y0) = (b.x as usize, b.y as usize);
        let (x1, y1) = (b.right() as usize, b.bottom() as usize);
        self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0]
    }
}
