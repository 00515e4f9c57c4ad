//! Error types for the medscan-report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MedScanError`] — **Fatal** for the request: the boundary cannot
//!   produce its payload (bad upload, undecodable image, service not
//!   configured, model call failed, malformed export input). Every boundary
//!   in [`crate::boundary`] returns `Err(MedScanError)` and callers turn it
//!   into an [`ErrorResponse`] with [`MedScanError::to_response`].
//!
//! * [`CleanupWarning`] — **Non-fatal**: a transient artifact could not be
//!   deleted right away. It is logged and deferred, never surfaced to the
//!   caller as a request failure.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the medscan-report library.
#[derive(Debug, Error)]
pub enum MedScanError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The upload boundary received no file field.
    #[error("No file provided")]
    NoFileProvided,

    /// A file field was present but carried an empty filename.
    #[error("No file selected")]
    NoFileSelected,

    // ── Decode errors ─────────────────────────────────────────────────────
    /// The DICOM container could not be parsed or its pixel data decoded.
    #[error("Failed to read DICOM file '{filename}': {detail}")]
    DicomDecode { filename: String, detail: String },

    /// A raster image (PNG, JPEG, BMP, …) could not be decoded.
    #[error("Failed to decode image '{filename}': {source}")]
    ImageDecode {
        filename: String,
        #[source]
        source: image::ImageError,
    },

    /// The decoded pixel grid has a zero dimension.
    #[error("Image '{filename}' has no pixels ({width}x{height})")]
    EmptyImage {
        filename: String,
        width: u32,
        height: u32,
    },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The reasoning service has no credential or could not be created.
    #[error("Medical analysis provider '{provider}' is not configured.\n{hint}")]
    NotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The reasoning service call failed (network, auth, quota, …).
    #[error("Medical analysis failed: {detail}")]
    AnalysisFailed { detail: String },

    /// The reasoning service answered with no usable text.
    #[error("Medical analysis returned an empty response")]
    EmptyAnalysis,

    // ── Assembly errors ───────────────────────────────────────────────────
    /// A required export field is absent or blank.
    #[error("Missing {field} data")]
    MissingField { field: &'static str },

    /// The image field is not a `data:image/...;base64,` URI.
    #[error("Invalid image data URI: {detail}")]
    InvalidDataUri { detail: String },

    /// The data URI decoded, but its payload is not a readable image.
    #[error("Invalid image payload: {detail}")]
    InvalidImagePayload { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (broken invariant, task panic, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class of a [`MedScanError`], as reported to boundary callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Decode,
    Configuration,
    Analysis,
    Assembly,
    Internal,
}

impl MedScanError {
    /// Classify this error into the boundary-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MedScanError::NoFileProvided | MedScanError::NoFileSelected => {
                ErrorKind::InvalidRequest
            }
            MedScanError::DicomDecode { .. }
            | MedScanError::ImageDecode { .. }
            | MedScanError::EmptyImage { .. } => ErrorKind::Decode,
            MedScanError::NotConfigured { .. } | MedScanError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            MedScanError::AnalysisFailed { .. } | MedScanError::EmptyAnalysis => {
                ErrorKind::Analysis
            }
            MedScanError::MissingField { .. }
            | MedScanError::InvalidDataUri { .. }
            | MedScanError::InvalidImagePayload { .. } => ErrorKind::Assembly,
            MedScanError::OutputWriteFailed { .. } | MedScanError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRequest | ErrorKind::Decode | ErrorKind::Assembly => 400,
            ErrorKind::Configuration => 503,
            ErrorKind::Analysis => 502,
            ErrorKind::Internal => 500,
        }
    }

    /// Convert into the uniform error payload returned by every boundary.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
            status: self.status_code(),
        }
    }
}

/// Uniform error payload: message plus failure status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub status: u16,
}

impl From<MedScanError> for ErrorResponse {
    fn from(e: MedScanError) -> Self {
        e.to_response()
    }
}

/// A transient artifact could not be removed immediately.
///
/// Logged at `warn` and handed to the deferred exit cleanup; never returned
/// from a boundary.
#[derive(Debug, Error)]
#[error("Could not remove transient file '{path}' after {attempts} attempts: {source}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub attempts: u32,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_is_distinct_from_analysis_failure() {
        let cfg = MedScanError::NotConfigured {
            provider: "gemini".into(),
            hint: "Set GEMINI_API_KEY".into(),
        };
        let failed = MedScanError::AnalysisFailed {
            detail: "HTTP 500".into(),
        };
        assert_eq!(cfg.kind(), ErrorKind::Configuration);
        assert_eq!(failed.kind(), ErrorKind::Analysis);
        assert_ne!(cfg.status_code(), failed.status_code());
    }

    #[test]
    fn missing_field_display() {
        let e = MedScanError::MissingField { field: "image" };
        assert_eq!(e.to_string(), "Missing image data");
        assert_eq!(e.kind(), ErrorKind::Assembly);
        assert_eq!(e.status_code(), 400);
    }

    #[test]
    fn dicom_decode_display_carries_cause() {
        let e = MedScanError::DicomDecode {
            filename: "scan.dcm".into(),
            detail: "missing Pixel Data".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.dcm"), "got: {msg}");
        assert!(msg.contains("missing Pixel Data"), "got: {msg}");
    }

    #[test]
    fn error_response_serialises_kind_snake_case() {
        let resp = MedScanError::NoFileSelected.to_response();
        let json = serde_json::to_value(&resp).expect("serialise");
        assert_eq!(json["error"], "No file selected");
        assert_eq!(json["kind"], "invalid_request");
        assert_eq!(json["status"], 400);
    }

    #[test]
    fn cleanup_warning_display() {
        let w = CleanupWarning {
            path: PathBuf::from("/tmp/medscan-x.png"),
            attempts: 3,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        };
        let msg = w.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("locked"));
    }
}
