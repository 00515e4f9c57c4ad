//! Resize a decoded bitmap to the fixed display/analysis width.
//!
//! The target is always exactly `max_width` pixels wide (small images are
//! upscaled) with the height derived from the original aspect ratio.

use crate::error::MedScanError;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Height that preserves the aspect ratio of `width × height` at `max_width`.
///
/// Returns `None` when either source dimension is zero.
pub fn scaled_height(width: u32, height: u32, max_width: u32) -> Option<u32> {
    if width == 0 || height == 0 {
        return None;
    }
    let aspect_ratio = width as f64 / height as f64;
    let h = (max_width as f64 / aspect_ratio).round();
    // Extremely wide panoramas would otherwise round down to nothing.
    Some((h as u32).max(1))
}

/// Resize `img` to `max_width` wide, keeping its aspect ratio.
pub fn resize_to_width(img: &DynamicImage, max_width: u32) -> Result<DynamicImage, MedScanError> {
    if max_width == 0 {
        return Err(MedScanError::Internal("resize target width is 0".into()));
    }
    let (w, h) = (img.width(), img.height());
    let new_height = scaled_height(w, h, max_width).ok_or_else(|| {
        MedScanError::Internal(format!("cannot resize a {w}x{h} bitmap"))
    })?;

    debug!("Resizing {}x{} → {}x{}", w, h, max_width, new_height);
    Ok(img.resize_exact(max_width, new_height, FilterType::CatmullRom))
}
