//! First-page raster extraction from scanned PDFs using lopdf.
//!
//! Certificates arrive as scans wrapped in a PDF: page 1 carries one large
//! image XObject (JPEG, TIFF, or raw pixel data) and possibly small
//! decorations. The largest image is taken as the page scan. Vector-only
//! PDFs have no raster to analyse and are rejected.

use image::{DynamicImage, GenericImageView};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::decode::{decode_bounded, ensure_pixel_budget};
use super::NormalizeError;

/// Decode the main scan image of the first page. Every image's declared
/// size must fit `max_pixels`, checked before any stream is decoded.
pub fn extract_first_page_image(
    pdf_bytes: &[u8],
    max_pixels: u64,
) -> Result<DynamicImage, NormalizeError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| NormalizeError::Pdf(format!("Failed to parse PDF: {e}")))?;

    let page_id: ObjectId = doc
        .page_iter()
        .next()
        .ok_or_else(|| NormalizeError::Pdf("PDF has no pages".into()))?;

    let page_dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| NormalizeError::Pdf(format!("Page object error: {e}")))?;

    // Navigate: /Resources → /XObject
    let resources = resolve_dict_entry(&doc, page_dict, b"Resources")?;
    let xobjects = resolve_dict_entry(&doc, resources, b"XObject")?;

    let mut largest: Option<(u64, &Stream)> = None;
    for (_name, obj_ref) in xobjects.iter() {
        let stream = match resolve_object(&doc, obj_ref) {
            Object::Stream(s) if is_image_subtype(&s.dict) => s,
            _ => continue,
        };
        let width = get_int(&stream.dict, b"Width").unwrap_or(0).max(0) as u64;
        let height = get_int(&stream.dict, b"Height").unwrap_or(0).max(0) as u64;
        let pixels = ensure_pixel_budget(width, height, max_pixels)?;
        if largest.map_or(true, |(prev, _)| pixels > prev) {
            largest = Some((pixels, stream));
        }
    }

    let (pixels, stream) = largest
        .ok_or_else(|| NormalizeError::Pdf("No image XObjects on the first page".into()))?;

    let image = decode_image_stream(&doc, stream, max_pixels)?;
    debug!(
        pixels,
        width = image.width(),
        height = image.height(),
        "Extracted scan image from PDF page 1"
    );
    Ok(image)
}

/// Check if a stream dictionary has /Subtype /Image.
fn is_image_subtype(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == b"Image"))
        .unwrap_or(false)
}

fn has_filter(dict: &Dictionary, name: &[u8]) -> bool {
    dict.get(b"Filter")
        .map(|f| match f {
            Object::Name(n) => n == name,
            Object::Array(arr) => arr
                .iter()
                .any(|o| matches!(o, Object::Name(ref n) if n == name)),
            _ => false,
        })
        .unwrap_or(false)
}

fn decode_image_stream(
    doc: &Document,
    stream: &Stream,
    max_pixels: u64,
) -> Result<DynamicImage, NormalizeError> {
    // DCTDecode = JPEG: the stream content IS the JPEG file. Its own header
    // may disagree with /Width and /Height, so the budget is checked again.
    if has_filter(&stream.dict, b"DCTDecode") {
        return decode_bounded(&stream.content, Some(image::ImageFormat::Jpeg), max_pixels);
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    // Some streams contain a complete image file (TIFF, PNG).
    match decode_bounded(&content, None, max_pixels) {
        Ok(img) => return Ok(img),
        Err(e @ NormalizeError::TooManyPixels { .. }) => return Err(e),
        Err(_) => {}
    }

    reconstruct_raw_image(doc, &stream.dict, content, max_pixels)
}

/// Rebuild an image from raw 8-bit samples using /Width, /Height and /ColorSpace.
fn reconstruct_raw_image(
    doc: &Document,
    dict: &Dictionary,
    raw_pixels: Vec<u8>,
    max_pixels: u64,
) -> Result<DynamicImage, NormalizeError> {
    let width = u32::try_from(get_int(dict, b"Width")?)
        .map_err(|_| NormalizeError::Pdf("/Width out of range".into()))?;
    let height = u32::try_from(get_int(dict, b"Height")?)
        .map_err(|_| NormalizeError::Pdf("/Height out of range".into()))?;
    let bpc = get_int(dict, b"BitsPerComponent").unwrap_or(8);
    if bpc != 8 {
        return Err(NormalizeError::Pdf(format!(
            "Unsupported /BitsPerComponent {bpc}"
        )));
    }

    let pixels = ensure_pixel_budget(width as u64, height as u64, max_pixels)?;

    let channels = determine_channels(doc, dict);
    let expected = pixels
        .checked_mul(channels as u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| NormalizeError::Pdf("Raw sample count overflows".into()))?;
    if raw_pixels.len() < expected {
        return Err(NormalizeError::Pdf(format!(
            "Raw pixel buffer too small: {} bytes, expected {} ({}x{}x{})",
            raw_pixels.len(),
            expected,
            width,
            height,
            channels
        )));
    }
    let mut raw_pixels = raw_pixels;
    raw_pixels.truncate(expected);

    let img = match channels {
        1 => image::GrayImage::from_raw(width, height, raw_pixels).map(DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, raw_pixels).map(DynamicImage::ImageRgb8),
        // CMYK read as RGBA: only luminance structure matters downstream.
        4 => image::RgbaImage::from_raw(width, height, raw_pixels).map(DynamicImage::ImageRgba8),
        _ => None,
    };
    img.ok_or_else(|| NormalizeError::Pdf(format!("Unsupported channel count: {channels}")))
}

/// Determine the number of color channels from the /ColorSpace entry.
fn determine_channels(doc: &Document, dict: &Dictionary) -> u32 {
    let cs = match dict.get(b"ColorSpace") {
        Ok(obj) => resolve_object(doc, obj),
        Err(_) => return 3,
    };

    match cs {
        Object::Name(ref n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" => 1,
            b"DeviceCMYK" => 4,
            _ => 3,
        },
        Object::Array(ref arr) if !arr.is_empty() => match &arr[0] {
            Object::Name(ref n) if n == b"ICCBased" => arr
                .get(1)
                .map(|o| resolve_object(doc, o))
                .and_then(|o| match o {
                    Object::Stream(s) => get_int(&s.dict, b"N").ok(),
                    _ => None,
                })
                .map(|n| n.clamp(1, 4) as u32)
                .unwrap_or(3),
            Object::Name(ref n) if n == b"Indexed" => 1,
            _ => 3,
        },
        _ => 3,
    }
}

/// Resolve a PDF object reference to its target, or return the object as-is.
fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Get a dictionary entry, following references, and return it as a Dictionary.
fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Result<&'a Dictionary, NormalizeError> {
    let obj = dict.get(key).map_err(|_| {
        NormalizeError::Pdf(format!(
            "Missing /{} on the first page",
            String::from_utf8_lossy(key)
        ))
    })?;

    resolve_object(doc, obj).as_dict().map_err(|_| {
        NormalizeError::Pdf(format!(
            "/{} is not a dictionary",
            String::from_utf8_lossy(key)
        ))
    })
}

fn get_int(dict: &Dictionary, key: &[u8]) -> Result<i64, NormalizeError> {
    dict.get(key)
        .and_then(Object::as_i64)
        .map_err(|_| {
            NormalizeError::Pdf(format!(
                "Missing or non-integer /{} in image dictionary",
                String::from_utf8_lossy(key)
            ))
        })
}

// ── Tests ────────────────────────────────────────────────────────────────
