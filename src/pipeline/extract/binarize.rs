//! Ink mask and glyph-merging dilation.

use image::GrayImage;

/// Binary page mask, row-major. `true` = ink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InkMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl InkMask {
    /// Pixels `<= threshold` are ink.
    pub fn from_threshold(gray: &GrayImage, threshold: u8) -> Self {
        Self {
            width: gray.width(),
            height: gray.height(),
            bits: gray.pixels().map(|p| p.0[0] <= threshold).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn ink_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn ink_fraction(&self) -> f32 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.ink_count() as f32 / self.bits.len() as f32
    }

    /// Separable box dilation: a pixel is set when any ink lies within
    /// `rx` columns and `ry` rows of it.
    pub fn dilate(&self, rx: u32, ry: u32) -> InkMask {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut horizontal = vec![false; self.bits.len()];
        for y in 0..h {
            let row = &self.bits[y * w..(y + 1) * w];
            spread(row, rx as usize, &mut horizontal[y * w..(y + 1) * w]);
        }

        let mut out = vec![false; self.bits.len()];
        let mut column = vec![false; h];
        let mut dilated = vec![false; h];
        for x in 0..w {
            for (y, cell) in column.iter_mut().enumerate() {
                *cell = horizontal[y * w + x];
            }
            spread(&column, ry as usize, &mut dilated);
            for (y, &set) in dilated.iter().enumerate() {
                out[y * w + x] = set;
            }
        }

        InkMask {
            width: self.width,
            height: self.height,
            bits: out,
        }
    }
}

/// 1-D dilation by running count over a window of `2r + 1`.
fn spread(line: &[bool], r: usize, out: &mut [bool]) {
    let n = line.len();
    let mut prefix = vec![0u32; n + 1];
    for (i, &b) in line.iter().enumerate() {
        prefix[i + 1] = prefix[i] + u32::from(b);
    }
    for (i, cell) in out.iter_mut().enumerate() {
        let lo = i.saturating_sub(r);
        let hi = (i + r + 1).min(n);
        *cell = prefix[hi] > prefix[lo];
    }
}
