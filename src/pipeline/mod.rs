//! Pipeline stages for medical image analysis.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the boundaries in [`crate::boundary`] only
//! compose them.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ resize ──▶ encode ──▶ artifact ──▶ llm
//! (DICOM/    (500 px)   (PNG,      (temp PNG,   (VLM)
//!  raster)               data URI)  released)
//! ```
//!
//! 1. [`decode`]   — bytes + filename → 8-bit gray/RGB bitmap
//! 2. [`resize`]   — fixed width, aspect ratio preserved
//! 3. [`encode`]   — PNG bytes, data URIs, vision-request attachments
//! 4. [`artifact`] — per-request temporary PNG with guaranteed release
//! 5. [`llm`]      — the single network call, behind [`llm::ReasoningService`]

pub mod artifact;
pub mod decode;
pub mod encode;
pub mod llm;
pub mod resize;
