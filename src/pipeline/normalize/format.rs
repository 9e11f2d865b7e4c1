use tracing::debug;

use super::NormalizeError;
use crate::models::{DeclaredFormat, DocumentFormat};

/// Inputs larger than this are rejected before decoding.
pub const MAX_INPUT_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Smallest valid PNG is ~67 bytes.
pub const MIN_INPUT_BYTES: usize = 67;

/// Detect the container from magic bytes (NOT the caller's claim).
/// Magic bytes win over the declared format.
pub fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(DocumentFormat::Pdf),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(DocumentFormat::Jpeg),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(DocumentFormat::Png),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => {
            Some(DocumentFormat::Tiff)
        }
        _ => None,
    }
}

/// Size bounds, then sniffing. A declaration that disagrees with the magic
/// bytes is logged and overridden; unrecognized content is a decode error
/// whatever the declaration says.
pub fn resolve_format(
    bytes: &[u8],
    declared: DeclaredFormat,
) -> Result<DocumentFormat, NormalizeError> {
    validate_input_size(bytes)?;

    let sniffed = sniff_format(bytes).ok_or(NormalizeError::UnsupportedFormat)?;
    if let Some(claimed) = declared.as_document_format() {
        if claimed != sniffed {
            debug!(
                declared = claimed.as_str(),
                detected = sniffed.as_str(),
                "Declared format overridden by magic bytes"
            );
        }
    }
    Ok(sniffed)
}

pub fn validate_input_size(bytes: &[u8]) -> Result<(), NormalizeError> {
    if bytes.len() < MIN_INPUT_BYTES {
        return Err(NormalizeError::TooSmall(bytes.len()));
    }
    if bytes.len() > MAX_INPUT_BYTES {
        return Err(NormalizeError::TooLarge {
            size: bytes.len(),
            limit_mb: MAX_INPUT_BYTES / (1024 * 1024),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.resize(128, 0);
        bytes
    }

    #[test]
    fn sniff_known_magic_bytes() {
        assert_eq!(sniff_format(b"%PDF-1.4"), Some(DocumentFormat::Pdf));
        assert_eq!(
            sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(DocumentFormat::Jpeg)
        );
        assert_eq!(
            sniff_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            Some(DocumentFormat::Png)
        );
        assert_eq!(
            sniff_format(&[0x49, 0x49, 0x2A, 0x00]),
            Some(DocumentFormat::Tiff)
        );
        assert_eq!(
            sniff_format(&[0x4D, 0x4D, 0x00, 0x2A]),
            Some(DocumentFormat::Tiff)
        );
        assert_eq!(sniff_format(&[0x4D, 0x5A, 0x90, 0x00]), None);
        assert_eq!(sniff_format(&[]), None);
    }

    #[test]
    fn magic_bytes_override_declaration() {
        let jpeg = padded(&[0xFF, 0xD8, 0xFF, 0xE0]);
        let format = resolve_format(&jpeg, DeclaredFormat::Pdf).unwrap();
        assert_eq!(format, DocumentFormat::Jpeg);
    }

    #[test]
    fn unknown_content_rejected_even_when_declared() {
        let exe = padded(&[0x4D, 0x5A, 0x90, 0x00]);
        let err = resolve_format(&exe, DeclaredFormat::Png).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedFormat));
    }

    #[test]
    fn tiny_input_rejected() {
        let err = resolve_format(&[0x89, 0x50, 0x4E, 0x47], DeclaredFormat::Auto).unwrap_err();
        assert!(matches!(err, NormalizeError::TooSmall(4)));
    }

    #[test]
    fn oversized_input_rejected() {
        let huge = vec![0u8; MAX_INPUT_BYTES + 1];
        assert!(matches!(
            validate_input_size(&huge),
            Err(NormalizeError::TooLarge { .. })
        ));
    }
}
