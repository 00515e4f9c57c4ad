//! Payloads produced by the boundaries in [`crate::boundary`].
//!
//! All of them serialise to the JSON shapes a web front-end expects; the
//! export payload carries raw bytes and is streamed rather than serialised.

use serde::{Deserialize, Serialize};

/// Response of the upload boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewOutput {
    pub success: bool,
    /// `data:image/png;base64,…` of the resized image.
    pub preview: String,
}

/// Token and timing figures for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Response of the analysis boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub success: bool,
    /// Cleaned markdown returned by the reasoning service.
    pub analysis: String,
    /// Data URI of exactly the image that was analysed, for a later export.
    pub image_base64: String,
    pub stats: AnalysisStats,
}

/// Request body of the export boundary.
///
/// Both fields are optional at the type level so that a missing field is
/// reported as an assembly error rather than a deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl From<&AnalysisOutput> for ExportRequest {
    fn from(out: &AnalysisOutput) -> Self {
        Self {
            analysis: Some(out.analysis.clone()),
            image_base64: Some(out.image_base64.clone()),
        }
    }
}

/// A finished document ready to stream to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Response of the health boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub api_configured: bool,
}
