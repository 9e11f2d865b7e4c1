use serde::{Deserialize, Serialize};

/// Axis-aligned pixel box on the normalized raster. `x + width` and
/// `y + height` are exclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box spanning inclusive pixel extremes.
    pub fn from_extremes(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x.saturating_sub(min_x) + 1,
            height: max_y.saturating_sub(min_y) + 1,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return 0;
        }
        (x1 - x0) as u64 * (y1 - y0) as u64
    }

    /// Intersection as a fraction of the smaller box.
    pub fn overlap_fraction(&self, other: &BoundingBox) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f32 / smaller as f32
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let inside = |start: u32, len: u32, limit: u32| {
            len > 0 && start.checked_add(len).map_or(false, |end| end <= limit)
        };
        inside(self.x, self.width, width) && inside(self.y, self.height, height)
    }

    /// Express the box in page units (0..1 on both axes).
    pub fn normalized(&self, page_width: u32, page_height: u32) -> NormBox {
        let w = page_width.max(1) as f32;
        let h = page_height.max(1) as f32;
        NormBox {
            x: self.x as f32 / w,
            y: self.y as f32 / h,
            width: self.width as f32 / w,
            height: self.height as f32 / h,
        }
    }
}

/// Box in page units, comparable across rasters of different size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center_distance(&self, other: &NormBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Back to pixels on a `page_width × page_height` raster, clipped to the
    /// page and never empty.
    pub fn to_pixels(&self, page_width: u32, page_height: u32) -> BoundingBox {
        fn span(start: f32, len: f32, limit: u32) -> (u32, u32) {
            let limit = limit.max(1);
            let lo = ((start * limit as f32).floor() as u32).min(limit - 1);
            let hi = (((start + len) * limit as f32).ceil() as u32).clamp(lo + 1, limit);
            (lo, hi - lo)
        }
        let (x, width) = span(self.x, self.width, page_width);
        let (y, height) = span(self.y, self.height, page_height);
        BoundingBox::new(x, y, width, height)
    }
}
