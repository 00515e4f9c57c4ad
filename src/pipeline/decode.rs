//! Image decoding: raw upload bytes → normalised 8-bit `DynamicImage`.
//!
//! Two input families arrive at the same boundary:
//!
//! * **DICOM** (`.dcm` / `.dicom`, matched case-insensitively on the filename).
//!   The pixel matrix is decoded by `dicom-pixeldata`, converted to `f64` and
//!   linearly stretched from its own observed min/max to 0–255. 8-, 12- and
//!   16-bit studies therefore all land in the same display range.
//! * **Everything else** goes through the `image` codec (PNG, JPEG, BMP, GIF,
//!   TIFF, WebP), which sniffs the format from the content.
//!
//! Detection is purely by filename; a DICOM file uploaded without one of the
//! two extensions is handed to the raster codec and fails there.
//!
//! The decoder only borrows the uploaded bytes and never seeks: the whole
//! upload is read once into memory by [`crate::boundary::RawUpload`].

use crate::error::MedScanError;
use dicom_pixeldata::PixelDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::debug;

/// Filename suffixes routed to the DICOM decoder.
pub const DICOM_EXTENSIONS: [&str; 2] = [".dcm", ".dicom"];

/// Offset of the `DICM` magic in a Part 10 file (after the 128-byte preamble).
const PREAMBLE_LEN: usize = 128;

/// Whether `filename` names a DICOM container.
pub fn is_dicom_filename(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    DICOM_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Decode an upload into a normalised bitmap.
///
/// Guarantees `width > 0 && height > 0` on success.
pub fn decode_image(bytes: &[u8], filename: &str) -> Result<DynamicImage, MedScanError> {
    let img = if is_dicom_filename(filename) {
        decode_dicom(bytes, filename)?
    } else {
        decode_raster(bytes, filename)?
    };

    if img.width() == 0 || img.height() == 0 {
        return Err(MedScanError::EmptyImage {
            filename: filename.to_string(),
            width: img.width(),
            height: img.height(),
        });
    }

    debug!(
        "Decoded '{}' → {}x{} {:?}",
        filename,
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

/// Decode a generic raster image and normalise it to 8-bit gray or RGB.
pub fn decode_raster(bytes: &[u8], filename: &str) -> Result<DynamicImage, MedScanError> {
    let img = image::load_from_memory(bytes).map_err(|e| MedScanError::ImageDecode {
        filename: filename.to_string(),
        source: e,
    })?;
    Ok(normalise_bitmap(img))
}

/// Collapse any decoded pixel layout to `Luma8` (no colour) or `Rgb8`.
///
/// Alpha is dropped; 16-bit and float images are narrowed to 8 bits.
pub fn normalise_bitmap(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        other if !other.color().has_color() => DynamicImage::ImageLuma8(other.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Decode a DICOM Part 10 stream (with or without its 128-byte preamble).
///
/// Only the first frame of a multi-frame object is used.
pub fn decode_dicom(bytes: &[u8], filename: &str) -> Result<DynamicImage, MedScanError> {
    let fail = |detail: String| MedScanError::DicomDecode {
        filename: filename.to_string(),
        detail,
    };

    let obj = dicom_object::from_reader(strip_preamble(bytes)).map_err(|e| fail(e.to_string()))?;
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| fail(e.to_string()))?;

    let width = decoded.columns();
    let height = decoded.rows();
    let channels = decoded.samples_per_pixel();
    debug!(
        "DICOM '{}': {}x{}, {} sample(s)/pixel, {} frame(s)",
        filename,
        width,
        height,
        channels,
        decoded.number_of_frames()
    );

    let values: Vec<f64> = decoded
        .to_vec_frame(0)
        .map_err(|e| fail(e.to_string()))?;

    let pixels = DicomPixelData::new(width, height, channels, values).map_err(fail)?;
    pixels.into_bitmap().map_err(fail)
}

/// Skip the 128-byte preamble when the `DICM` magic follows it.
fn strip_preamble(bytes: &[u8]) -> &[u8] {
    match bytes.get(PREAMBLE_LEN..PREAMBLE_LEN + 4) {
        Some(magic) if magic == b"DICM" => &bytes[PREAMBLE_LEN..],
        _ => bytes,
    }
}

/// A DICOM pixel matrix in floating point, before display rescaling.
///
/// `values` is row-major with `channels` interleaved samples per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DicomPixelData {
    width: u32,
    height: u32,
    channels: u16,
    values: Vec<f64>,
}

impl DicomPixelData {
    pub fn new(width: u32, height: u32, channels: u16, values: Vec<f64>) -> Result<Self, String> {
        if channels != 1 && channels != 3 {
            return Err(format!("unsupported samples per pixel: {channels}"));
        }
        let expected = width as usize * height as usize * channels as usize;
        if values.len() != expected {
            return Err(format!(
                "pixel matrix has {} values, expected {} ({}x{}x{})",
                values.len(),
                expected,
                width,
                height,
                channels
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            values,
        })
    }

    /// Observed minimum and maximum, ignoring NaN. `None` for an empty matrix.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut it = self.values.iter().copied().filter(|v| !v.is_nan());
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Stretch the observed range to 0–255 and truncate to `u8`.
    ///
    /// A flat matrix (max == min) maps to all zeros.
    pub fn rescale_to_u8(&self) -> Vec<u8> {
        let Some((lo, hi)) = self.min_max() else {
            return Vec::new();
        };
        let range = hi - lo;
        self.values
            .iter()
            .map(|&v| {
                let shifted = v - lo;
                let unit = if range > 0.0 { shifted / range } else { shifted };
                (unit * 255.0) as u8
            })
            .collect()
    }

    /// Rescale into a single-channel (or RGB, for 3 samples) bitmap.
    pub fn into_bitmap(self) -> Result<DynamicImage, String> {
        let (w, h) = (self.width, self.height);
        let buf = self.rescale_to_u8();
        let img = if self.channels == 3 {
            RgbImage::from_raw(w, h, buf).map(DynamicImage::ImageRgb8)
        } else {
            GrayImage::from_raw(w, h, buf).map(DynamicImage::ImageLuma8)
        };
        img.ok_or_else(|| format!("pixel buffer does not fit {w}x{h}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn dicom_extension_match_is_case_insensitive() {
        assert!(is_dicom_filename("scan.dcm"));
        assert!(is_dicom_filename("SCAN.DCM"));
        assert!(is_dicom_filename("study.Dicom"));
        assert!(!is_dicom_filename("scan.png"));
        assert!(!is_dicom_filename("dcm"));
        assert!(!is_dicom_filename("scan.dcm.png"));
    }

    #[test]
    fn rescale_spans_full_range_at_min_and_max() {
        // 12-bit style values
        let px = DicomPixelData::new(2, 2, 1, vec![100.0, 4095.0, 2000.0, 100.0]).unwrap();
        let out = px.rescale_to_u8();
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 255);
        assert_eq!(out[3], 0);
        assert!(out[2] > 0 && out[2] < 255);
    }

    #[test]
    fn rescale_handles_negative_hounsfield_values() {
        let px = DicomPixelData::new(3, 1, 1, vec![-1024.0, 0.0, 3071.0]).unwrap();
        assert_eq!(px.rescale_to_u8(), vec![0, 63, 255]);
    }

    #[test]
    fn flat_matrix_yields_zero_fill() {
        let px = DicomPixelData::new(3, 2, 1, vec![812.0; 6]).unwrap();
        assert_eq!(px.rescale_to_u8(), vec![0; 6]);
        let img = px.into_bitmap().unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert!(img.to_luma8().pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn three_samples_become_rgb() {
        let px = DicomPixelData::new(1, 2, 3, vec![0.0, 0.0, 0.0, 255.0, 102.0, 51.0]).unwrap();
        let img = px.into_bitmap().unwrap();
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
        assert_eq!(img.to_rgb8().get_pixel(0, 1).0, [255, 102, 51]);
    }

    #[test]
    fn pixel_count_mismatch_is_rejected() {
        let err = DicomPixelData::new(2, 2, 1, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.contains("expected 4"), "got: {err}");
        assert!(DicomPixelData::new(1, 1, 2, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn decode_png_keeps_dimensions() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(7, 3, Rgba([10, 20, 30, 255])));
        let img = decode_image(&png_bytes(&src), "photo.PNG").unwrap();
        assert_eq!((img.width(), img.height()), (7, 3));
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn gray_alpha_normalises_to_luma() {
        let src = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 2, LumaA([90, 255])));
        let img = normalise_bitmap(src);
        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn garbage_raster_is_a_decode_error() {
        let err = decode_image(b"definitely not an image", "x.jpg").unwrap_err();
        assert!(matches!(err, MedScanError::ImageDecode { .. }), "got: {err:?}");
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let src = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, image::Luma([7])));
        let bytes = png_bytes(&src);
        let err = decode_image(&bytes[..bytes.len() / 2], "x.png").unwrap_err();
        assert!(matches!(err, MedScanError::ImageDecode { .. }), "got: {err:?}");
    }

    #[test]
    fn garbage_dicom_is_a_dicom_error() {
        let err = decode_image(&[0u8; 300], "scan.dcm").unwrap_err();
        assert!(matches!(err, MedScanError::DicomDecode { .. }), "got: {err:?}");
    }

    #[test]
    fn preamble_is_skipped_only_before_magic() {
        let mut with = vec![0u8; 128];
        with.extend_from_slice(b"DICMrest");
        assert_eq!(strip_preamble(&with), b"DICMrest");
        let without = b"DICMrest".to_vec();
        assert_eq!(strip_preamble(&without), b"DICMrest");
    }
}
