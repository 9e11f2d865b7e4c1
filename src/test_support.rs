//! Synthetic certificate scans for end-to-end tests.
//!
//! The page is a landscape A4 sheet at 100 dpi: a border frame, a notched
//! square logo, a title line, a centred four-line body, a date line, a
//! two-ring seal and a wavy signature. Every element can be moved or
//! dropped to produce tampered variants.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};

use crate::config::NormalizerConfig;
use crate::models::DeclaredFormat;
use crate::pipeline::normalize::deskew::rotate_about_center;
use crate::pipeline::normalize::{normalize, RasterDocument};

pub(crate) const PAGE_W: u32 = 1169;
pub(crate) const PAGE_H: u32 = 826;
pub(crate) const INK: u8 = 20;
pub(crate) const PAPER: u8 = 245;

/// Default seal centre (bottom-left quadrant).
pub(crate) const SEAL_HOME: (i32, i32) = (260, 640);

/// Alternative seal centre (top-right quadrant).
pub(crate) const SEAL_MOVED: (i32, i32) = (1000, 180);

#[derive(Debug, Clone)]
pub(crate) struct CertificateSpec {
    /// Scanner skew applied after drawing (degrees).
    pub rotation_deg: f32,
    pub seal_center: Option<(i32, i32)>,
    pub logo: bool,
    pub signature: bool,
    pub text: bool,
    pub border: bool,
}

impl Default for CertificateSpec {
    fn default() -> Self {
        Self {
            rotation_deg: 0.0,
            seal_center: Some(SEAL_HOME),
            logo: true,
            signature: true,
            text: true,
            border: true,
        }
    }
}

impl CertificateSpec {
    pub(crate) fn without_seal() -> Self {
        Self {
            seal_center: None,
            ..Self::default()
        }
    }

    pub(crate) fn with_moved_seal() -> Self {
        Self {
            seal_center: Some(SEAL_MOVED),
            ..Self::default()
        }
    }

    pub(crate) fn blank() -> Self {
        Self {
            seal_center: None,
            logo: false,
            signature: false,
            text: false,
            border: false,
            ..Self::default()
        }
    }
}

pub(crate) fn render_certificate(spec: &CertificateSpec) -> GrayImage {
    let mut img = GrayImage::from_pixel(PAGE_W, PAGE_H, Luma([PAPER]));

    if spec.border {
        // 6 px frame 30 px in from the edge
        fill_rect(&mut img, 30, 30, 1109, 6);
        fill_rect(&mut img, 30, 790, 1109, 6);
        fill_rect(&mut img, 30, 30, 6, 766);
        fill_rect(&mut img, 1133, 30, 6, 766);
    }

    if spec.logo {
        fill_rect(&mut img, 540, 70, 90, 90);
        clear_rect(&mut img, 575, 70, 20, 25);
    }

    if spec.text {
        // date, top-left
        text_line(&mut img, 80, 100, 18, 8, 12, 4);
        // title
        text_line(&mut img, 380, 190, 20, 14, 22, 6);
        // centred body
        for (row, chars) in [56u32, 48, 56, 40].into_iter().enumerate() {
            let width = chars * 12 - 4;
            let x = 585 - width as i32 / 2;
            text_line(&mut img, x, 270 + 30 * row as i32, chars, 8, 12, 4);
        }
    }

    if let Some((cx, cy)) = spec.seal_center {
        ring(&mut img, cx, cy, 64.0, 70.0);
        ring(&mut img, cx, cy, 48.0, 52.0);
    }

    if spec.signature {
        signature(&mut img, 780, 1000, 650, 25.0, 110.0);
    }

    if spec.rotation_deg != 0.0 {
        img = rotate_about_center(&img, -spec.rotation_deg, Luma([PAPER]));
    }
    img
}

pub(crate) fn encode_png(img: &GrayImage) -> Vec<u8> {
    encode(img, ImageOutputFormat::Png)
}

pub(crate) fn encode_jpeg(img: &GrayImage, quality: u8) -> Vec<u8> {
    encode(img, ImageOutputFormat::Jpeg(quality))
}

fn encode(img: &GrayImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut cursor, format)
        .expect("in-memory encode");
    cursor.into_inner()
}

/// PNG bytes of a rendered certificate.
pub(crate) fn certificate_png(spec: &CertificateSpec) -> Vec<u8> {
    encode_png(&render_certificate(spec))
}

/// Rendered, PNG-encoded and run through the default normalizer.
pub(crate) fn normalized_certificate(spec: &CertificateSpec) -> RasterDocument {
    normalize(
        &certificate_png(spec),
        DeclaredFormat::Png,
        &NormalizerConfig::default(),
    )
    .expect("fixture normalizes")
}

fn set(img: &mut GrayImage, x: i32, y: i32, value: u8) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Luma([value]));
    }
}

fn paint_rect(img: &mut GrayImage, x: i32, y: i32, w: u32, h: u32, value: u8) {
    for dy in 0..h as i32 {
        for dx in 0..w as i32 {
            set(img, x + dx, y + dy, value);
        }
    }
}

fn fill_rect(img: &mut GrayImage, x: i32, y: i32, w: u32, h: u32) {
    paint_rect(img, x, y, w, h, INK);
}

fn clear_rect(img: &mut GrayImage, x: i32, y: i32, w: u32, h: u32) {
    paint_rect(img, x, y, w, h, PAPER);
}

/// A row of block glyphs, each with a one-pixel counter so strokes are not
/// solid slabs.
fn text_line(img: &mut GrayImage, x: i32, y: i32, chars: u32, cw: u32, ch: u32, gap: u32) {
    for i in 0..chars {
        let gx = x + (i * (cw + gap)) as i32;
        fill_rect(img, gx, y, cw, ch);
        clear_rect(img, gx + cw as i32 / 2, y + 2, 1, ch.saturating_sub(4));
    }
}

fn ring(img: &mut GrayImage, cx: i32, cy: i32, inner: f32, outer: f32) {
    let r = outer.ceil() as i32;
    for dy in -r..=r {
        for dx in -r..=r {
            let d = ((dx * dx + dy * dy) as f32).sqrt();
            if d >= inner && d <= outer {
                set(img, cx + dx, cy + dy, INK);
            }
        }
    }
}

/// Sinusoidal stroke, 3 px thick.
fn signature(img: &mut GrayImage, x0: i32, x1: i32, cy: i32, amp: f32, period: f32) {
    let y_at = |x: i32| {
        cy as f32 + amp * (2.0 * std::f32::consts::PI * (x - x0) as f32 / period).sin()
    };
    for x in x0..x1 {
        let (ya, yb) = (y_at(x), y_at(x + 1));
        let (lo, hi) = (ya.min(yb).round() as i32, ya.max(yb).round() as i32);
        for y in lo - 1..=hi + 1 {
            set(img, x, y, INK);
            set(img, x + 1, y, INK);
        }
    }
}
