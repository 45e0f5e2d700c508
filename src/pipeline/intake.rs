//! Upload intake: refuse unusable files before anything leaves the process.
//!
//! Checks run cheapest first: the declared filename, then the declared
//! length, then the received byte count, and finally the leading magic bytes.
//! A rejected upload never reaches the vision API, so a mislabelled PDF or an
//! oversized photo costs nothing but this check.

use crate::error::BillScanError;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Largest accepted upload: 5 MiB.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Extensions accepted at intake (lower-case, without the dot).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Image encodings the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// MIME type sent to the vision API.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    /// Map a filename's extension (case-insensitive) to an image kind.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }

    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            _ => None,
        }
    }
}

/// An upload that passed intake; borrowed so the image is never copied.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub filename: &'a str,
    pub bytes: &'a [u8],
    pub kind: ImageKind,
}

impl ImageUpload<'_> {
    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// Validate an uploaded file.
///
/// Accepts only `.jpg`, `.jpeg` and `.png` files whose declared length is
/// non-zero, at most [`MAX_IMAGE_BYTES`], equal to the bytes received, and
/// whose content is really the image type the extension claims.
pub fn validate_upload<'a>(
    bytes: &'a [u8],
    filename: &'a str,
    declared_len: u64,
) -> Result<ImageUpload<'a>, BillScanError> {
    let kind = ImageKind::from_filename(filename).ok_or_else(|| {
        BillScanError::validation(format!(
            "Unsupported file type '{filename}'. Allowed extensions: .{}",
            ALLOWED_EXTENSIONS.join(", .")
        ))
    })?;

    if declared_len == 0 {
        return Err(BillScanError::validation(format!(
            "File '{filename}' is empty"
        )));
    }
    if declared_len > MAX_IMAGE_BYTES {
        return Err(BillScanError::validation(format!(
            "File '{filename}' is {declared_len} bytes; the limit is {MAX_IMAGE_BYTES} bytes (5 MiB)"
        )));
    }
    if bytes.len() as u64 != declared_len {
        return Err(BillScanError::validation(format!(
            "File '{filename}' declared {declared_len} bytes but {} were received",
            bytes.len()
        )));
    }

    let sniffed = image::guess_format(bytes).ok().and_then(ImageKind::from_format);
    match sniffed {
        Some(actual) if actual == kind => {}
        Some(actual) => {
            return Err(BillScanError::validation(format!(
                "File '{filename}' is named as {} but contains {}",
                kind.mime_type(),
                actual.mime_type()
            )));
        }
        None => {
            return Err(BillScanError::validation(format!(
                "File '{filename}' is not a readable PNG or JPEG image"
            )));
        }
    }

    debug!(
        "Accepted upload '{}' ({} bytes, {})",
        filename,
        declared_len,
        kind.mime_type()
    );
    Ok(ImageUpload {
        filename,
        bytes,
        kind,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest byte strings `image::guess_format` recognises.
    pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";
}

#[cfg(test)]
mod tests {
    use super::fixtures::{JPEG, PNG};
    use super::*;

    fn reason(err: BillScanError) -> String {
        match err {
            BillScanError::Validation { reason } => reason,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn extension_maps_to_mime() {
        assert_eq!(ImageKind::from_filename("a.png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_filename("a.jpg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_filename("a.JPEG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_filename("a.gif"), None);
        assert_eq!(ImageKind::from_filename("png"), None);
        assert_eq!(ImageKind::Png.mime_type(), "image/png");
        assert_eq!(ImageKind::Jpeg.mime_type(), "image/jpeg");
    }

    #[test]
    fn accepts_png_and_jpeg() {
        let png = validate_upload(PNG, "receipt.png", PNG.len() as u64).unwrap();
        assert_eq!(png.mime_type(), "image/png");
        let jpg = validate_upload(JPEG, "receipt.JPG", JPEG.len() as u64).unwrap();
        assert_eq!(jpg.mime_type(), "image/jpeg");
    }

    #[test]
    fn rejects_disallowed_extensions() {
        for name in ["receipt.pdf", "receipt.gif", "receipt", "receipt.png.exe"] {
            let msg = reason(validate_upload(PNG, name, PNG.len() as u64).unwrap_err());
            assert!(msg.contains("Unsupported file type"), "{name}: {msg}");
        }
    }

    #[test]
    fn rejects_empty_file() {
        let msg = reason(validate_upload(&[], "r.png", 0).unwrap_err());
        assert!(msg.contains("empty"));
    }

    #[test]
    fn rejects_oversized_declaration() {
        let msg = reason(validate_upload(PNG, "r.png", MAX_IMAGE_BYTES + 1).unwrap_err());
        assert!(msg.contains("limit"));
    }

    #[test]
    fn accepts_exactly_the_ceiling() {
        let mut bytes = PNG.to_vec();
        bytes.resize(MAX_IMAGE_BYTES as usize, 0);
        assert!(validate_upload(&bytes, "r.png", MAX_IMAGE_BYTES).is_ok());
    }

    #[test]
    fn rejects_length_mismatch() {
        let msg = reason(validate_upload(PNG, "r.png", PNG.len() as u64 + 3).unwrap_err());
        assert!(msg.contains("received"));
    }

    #[test]
    fn rejects_content_that_disagrees_with_extension() {
        let msg = reason(validate_upload(JPEG, "r.png", JPEG.len() as u64).unwrap_err());
        assert!(msg.contains("contains image/jpeg"), "{msg}");
    }

    #[test]
    fn rejects_unrecognisable_content() {
        let bytes = b"%PDF-1.7 not an image";
        let msg = reason(validate_upload(bytes, "r.jpg", bytes.len() as u64).unwrap_err());
        assert!(msg.contains("not a readable"));
    }
}
