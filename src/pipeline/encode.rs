//! Image encoding: `DynamicImage` ⇄ PNG ⇄ base64 data URI.
//!
//! PNG is lossless, so the bitmap the client previews is bit-for-bit the one
//! that was analysed and the one that ends up embedded in the report. The
//! data URI is how the image travels between the analysis and export
//! requests: the server keeps no session state.

use crate::error::MedScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every image this crate emits.
pub const PNG_MIME: &str = "image/png";

/// Serialise a bitmap as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, MedScanError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| MedScanError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Wrap PNG bytes as `data:image/png;base64,<payload>`.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(png))
}

/// Encode a bitmap straight to a PNG data URI.
pub fn to_data_uri(img: &DynamicImage) -> Result<String, MedScanError> {
    let uri = png_data_uri(&encode_png(img)?);
    debug!("Encoded {}x{} preview → {} chars", img.width(), img.height(), uri.len());
    Ok(uri)
}

/// Wrap PNG bytes as the image attachment of a vision request.
pub fn png_image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), PNG_MIME)
}

static RE_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^data:(image/[A-Za-z0-9.+-]+);base64,(.*)$").unwrap());

/// Split an image data URI into its MIME type and decoded bytes.
pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), MedScanError> {
    let caps = RE_DATA_URI
        .captures(uri.trim())
        .ok_or_else(|| MedScanError::InvalidDataUri {
            detail: "expected 'data:image/<type>;base64,<payload>'".into(),
        })?;
    let mime = caps[1].to_string();
    let payload: String = caps[2].chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(MedScanError::InvalidDataUri {
            detail: "empty base64 payload".into(),
        });
    }
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| MedScanError::InvalidDataUri {
            detail: format!("base64: {e}"),
        })?;
    Ok((mime, bytes))
}

/// Decode a data URI back into a bitmap.
pub fn image_from_data_uri(uri: &str) -> Result<DynamicImage, MedScanError> {
    let (_mime, bytes) = parse_data_uri(uri)?;
    image::load_from_memory(&bytes).map_err(|e| MedScanError::InvalidImagePayload {
        detail: e.to_string(),
    })
}
