use std::io::Cursor;

use image::io::Reader;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use super::pdf::extract_first_page_image;
use super::NormalizeError;
use crate::models::DocumentFormat;

/// Decode the container into pixels, upright.
pub fn decode_document(
    bytes: &[u8],
    format: DocumentFormat,
    max_pixels: u64,
) -> Result<DynamicImage, NormalizeError> {
    let img = match format {
        DocumentFormat::Pdf => extract_first_page_image(bytes, max_pixels)?,
        DocumentFormat::Png => decode_bounded(bytes, Some(ImageFormat::Png), max_pixels)?,
        DocumentFormat::Jpeg => decode_bounded(bytes, Some(ImageFormat::Jpeg), max_pixels)?,
        DocumentFormat::Tiff => decode_bounded(bytes, Some(ImageFormat::Tiff), max_pixels)?,
    };

    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(NormalizeError::Image("Decoded image is empty".into()));
    }

    // PDF scans carry no EXIF of their own.
    let img = if format == DocumentFormat::Pdf {
        img
    } else {
        let orientation = read_exif_orientation(bytes);
        if orientation != 1 {
            debug!(orientation, "Applying EXIF orientation");
        }
        apply_orientation(img, orientation)
    };
    Ok(img)
}

/// Fail unless `width × height` fits the pixel budget. Overflow counts as over.
pub fn ensure_pixel_budget(
    width: u64,
    height: u64,
    max_pixels: u64,
) -> Result<u64, NormalizeError> {
    match width.checked_mul(height) {
        Some(pixels) if pixels <= max_pixels => Ok(pixels),
        _ => Err(NormalizeError::TooManyPixels {
            width,
            height,
            limit: max_pixels,
        }),
    }
}

/// Decode an image file, reading its header first so oversized sources are
/// rejected before the pixel buffer exists. `None` guesses the format.
pub(crate) fn decode_bounded(
    bytes: &[u8],
    format: Option<ImageFormat>,
    max_pixels: u64,
) -> Result<DynamicImage, NormalizeError> {
    let (width, height) = reader(bytes, format)?
        .into_dimensions()
        .map_err(|e| NormalizeError::Image(format!("Failed to read image header: {e}")))?;
    ensure_pixel_budget(width as u64, height as u64, max_pixels)?;

    reader(bytes, format)?
        .decode()
        .map_err(|e| NormalizeError::Image(format!("Failed to decode image: {e}")))
}

fn reader(
    bytes: &[u8],
    format: Option<ImageFormat>,
) -> Result<Reader<Cursor<&[u8]>>, NormalizeError> {
    match format {
        Some(format) => Ok(Reader::with_format(Cursor::new(bytes), format)),
        None => Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| NormalizeError::Image(format!("Failed to read image header: {e}"))),
    }
}

/// Read EXIF orientation tag (0x0112) from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};

    const LIMIT: u64 = 64_000_000;

    fn encode(img: RgbImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_png_and_jpeg() {
        let img = RgbImage::from_pixel(40, 20, Rgb([200, 200, 200]));
        let png = encode(img.clone(), ImageOutputFormat::Png);
        let jpeg = encode(img, ImageOutputFormat::Jpeg(90));

        let a = decode_document(&png, DocumentFormat::Png, LIMIT).unwrap();
        let b = decode_document(&jpeg, DocumentFormat::Jpeg, LIMIT).unwrap();
        assert_eq!(a.dimensions(), (40, 20));
        assert_eq!(b.dimensions(), (40, 20));
    }

    #[test]
    fn corrupt_png_is_image_error() {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 100]);
        let err = decode_document(&bytes, DocumentFormat::Png, LIMIT).unwrap_err();
        assert!(matches!(err, NormalizeError::Image(_)));
    }

    #[test]
    fn no_exif_means_normal_orientation() {
        let png = encode(RgbImage::new(4, 4), ImageOutputFormat::Png);
        assert_eq!(read_exif_orientation(&png), 1);
        assert_eq!(read_exif_orientation(&[0u8; 10]), 1);
    }

    #[test]
    fn orientation_six_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 10));
        assert_eq!(apply_orientation(img.clone(), 6).dimensions(), (10, 30));
        assert_eq!(apply_orientation(img.clone(), 3).dimensions(), (30, 10));
        assert_eq!(apply_orientation(img, 42).dimensions(), (30, 10));
    }

    #[test]
    fn oversized_png_rejected_from_header() {
        let img = RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
        let png = encode(img, ImageOutputFormat::Png);
        let err = decode_document(&png, DocumentFormat::Png, 100_000).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::TooManyPixels {
                width: 400,
                height: 300,
                limit: 100_000
            }
        ));
        assert!(decode_document(&png, DocumentFormat::Png, 120_000).is_ok());
    }

    #[test]
    fn pixel_budget_catches_huge_and_overflowing_dimensions() {
        assert_eq!(ensure_pixel_budget(4000, 3000, LIMIT).unwrap(), 12_000_000);
        assert!(ensure_pixel_budget(20_000, 20_000, LIMIT).is_err());
        assert!(ensure_pixel_budget(1 << 33, 1 << 33, u64::MAX).is_err());
    }
}
