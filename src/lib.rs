//! # medscan-report
//!
//! Normalise medical images, have a vision model describe them, and export
//! the answer as a Word report.
//!
//! ## Why this crate?
//!
//! Medical uploads are heterogeneous: a 16-bit CT slice in a DICOM container
//! next to an 8-bit JPEG of an ECG strip. Before a model can look at either,
//! both must become the same thing: an 8-bit bitmap of a fixed width. After
//! the model has answered in loosely structured markdown, that text has to
//! become a document with real headings, page breaks and bold runs, with the
//! analysed image on top.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (bytes + filename)
//!  │
//!  ├─ 1. Decode    DICOM (min/max stretch to 0–255) or PNG/JPEG/BMP/…
//!  ├─ 2. Resize    fixed width (500 px), aspect ratio kept
//!  ├─ 3. Encode    PNG → data URI (preview, round-trip to export)
//!  ├─ 4. Analyse   PNG artifact → vision model with a fixed prompt
//!  └─ 5. Export    markdown → headings / page breaks / bold runs → DOCX
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medscan_report::{analyze_upload, export_report, ExportRequest, MedScanConfig, RawUpload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = MedScanConfig::from_env();
//!     let upload = RawUpload::from_path("chest.dcm").await?;
//!     let analysis = analyze_upload(Some(upload), &config).await?;
//!     println!("{}", analysis.analysis);
//!
//!     let doc = export_report(&ExportRequest::from(&analysis), &config).await?;
//!     std::fs::write(&doc.filename, &doc.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! medscan-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod boundary;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use boundary::{
    analyze_upload, analyze_upload_sync, export_report, export_to_file, health, prepare_image,
    preview_upload, RawUpload,
};
pub use config::{CleanupPolicy, MedScanConfig, MedScanConfigBuilder};
pub use document::{assemble_document, ExportableDocument, DOCX_FILENAME, DOCX_MIME};
pub use error::{CleanupWarning, ErrorKind, ErrorResponse, MedScanError};
pub use output::{
    AnalysisOutput, AnalysisStats, ExportOutput, ExportRequest, HealthStatus, PreviewOutput,
};
pub use pipeline::artifact::ExitCleanup;
pub use pipeline::llm::{LlmReasoningService, ReasoningService, ServiceReply};
pub use report::{parse_report, Block, TextRun};
