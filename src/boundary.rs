//! Request boundaries: upload preview, analysis, export and health.
//!
//! Each boundary runs one pipeline invocation for one request and owns
//! everything it creates; nothing is shared between requests except the
//! read-only [`MedScanConfig`]. The analysed image travels back to the
//! client as a data URI so a later export needs no server-side state.
//!
//! Every failure comes back as `Err(MedScanError)`; transports turn it into
//! a uniform [`crate::error::ErrorResponse`] with
//! [`MedScanError::to_response`]. No boundary returns a partial result.

use crate::config::{MedScanConfig, DEFAULT_PROVIDER};
use crate::document::{assemble_document, DOCX_FILENAME, DOCX_MIME};
use crate::error::MedScanError;
use crate::output::{
    AnalysisOutput, AnalysisStats, ExportOutput, ExportRequest, HealthStatus, PreviewOutput,
};
use crate::pipeline::artifact::TransientArtifact;
use crate::pipeline::llm::{LlmReasoningService, ReasoningService};
use crate::pipeline::{decode, encode, llm, resize};
use edgequake_llm::{
    AnthropicProvider, GeminiProvider, LLMProvider, OpenAIProvider, OpenRouterProvider,
};
use image::DynamicImage;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An uploaded file: its declared name and full contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Drain `reader` once, front to back.
    pub fn from_reader(filename: impl Into<String>, mut reader: impl Read) -> std::io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(filename, bytes))
    }

    /// Read a local file, using its file name as the declared name.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, bytes))
    }
}

/// Decode an upload and resize it to `width`. CPU-bound; blocks.
pub fn prepare_image(upload: &RawUpload, width: u32) -> Result<DynamicImage, MedScanError> {
    let img = decode::decode_image(&upload.bytes, &upload.filename)?;
    resize::resize_to_width(&img, width)
}

/// Upload boundary: decode, resize and return a PNG data-URI preview.
pub async fn preview_upload(
    upload: Option<RawUpload>,
    config: &MedScanConfig,
) -> Result<PreviewOutput, MedScanError> {
    let upload = require_upload(upload)?;
    info!("Preview: '{}' ({} bytes)", upload.filename, upload.bytes.len());

    let image = prepare_blocking(upload, config.preview_width).await?;
    let preview = encode::to_data_uri(&image)?;
    Ok(PreviewOutput {
        success: true,
        preview,
    })
}

/// Analysis boundary: normalise the image and ask the reasoning service.
///
/// The configuration is checked before any decoding happens. The image is
/// submitted through a [`TransientArtifact`] that is released whatever the
/// outcome of the call.
pub async fn analyze_upload(
    upload: Option<RawUpload>,
    config: &MedScanConfig,
) -> Result<AnalysisOutput, MedScanError> {
    let service = resolve_service(config)?;
    let upload = require_upload(upload)?;
    let start = Instant::now();
    info!("Analysis: '{}' ({} bytes)", upload.filename, upload.bytes.len());

    let image = prepare_blocking(upload, config.preview_width).await?;

    let artifact = TransientArtifact::write_png(
        &image,
        config.artifact_dir.as_deref(),
        config.cleanup,
    )?;
    let reply = match artifact.load_image_data().await {
        Ok(image_data) => llm::request_analysis(&service, image_data, config).await,
        Err(e) => Err(e),
    };
    if let Err(warning) = artifact.release().await {
        warn!("{warning}; deferred to process exit");
    }
    let reply = reply?;

    if reply.content.trim().is_empty() {
        return Err(MedScanError::EmptyAnalysis);
    }
    let analysis = reply.content;

    let image_base64 = encode::to_data_uri(&image)?;
    let stats = AnalysisStats {
        input_tokens: reply.prompt_tokens,
        output_tokens: reply.completion_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: {} chars, {}ms",
        analysis.len(),
        stats.duration_ms
    );

    Ok(AnalysisOutput {
        success: true,
        analysis,
        image_base64,
        stats,
    })
}

/// Synchronous wrapper around [`analyze_upload`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_upload_sync(
    upload: Option<RawUpload>,
    config: &MedScanConfig,
) -> Result<AnalysisOutput, MedScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MedScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_upload(upload, config))
}

/// Export boundary: rebuild the analysed image and render the DOCX report.
///
/// Input is validated in full before any document is built.
pub async fn export_report(
    request: &ExportRequest,
    config: &MedScanConfig,
) -> Result<ExportOutput, MedScanError> {
    let analysis = request
        .analysis
        .clone()
        .ok_or(MedScanError::MissingField { field: "analysis" })?;
    let image_uri = request
        .image_base64
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(MedScanError::MissingField { field: "image" })?;
    let image = encode::image_from_data_uri(image_uri)?;
    info!(
        "Export: {} chars of analysis, {}x{} image",
        analysis.len(),
        image.width(),
        image.height()
    );

    let width_inches = config.report_image_width_inches;
    let bytes = tokio::task::spawn_blocking(move || {
        assemble_document(&analysis, image, width_inches).to_docx()
    })
    .await
    .map_err(|e| MedScanError::Internal(format!("Export task panicked: {}", e)))??;

    Ok(ExportOutput {
        filename: DOCX_FILENAME.to_string(),
        mime_type: DOCX_MIME.to_string(),
        bytes,
    })
}

/// Export and write the document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn export_to_file(
    request: &ExportRequest,
    output_path: impl AsRef<Path>,
    config: &MedScanConfig,
) -> Result<ExportOutput, MedScanError> {
    let output = export_report(request, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| MedScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, &output.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    debug!("Wrote {} bytes to {}", output.bytes.len(), path.display());
    Ok(output)
}

/// Health boundary.
pub fn health(config: &MedScanConfig) -> HealthStatus {
    HealthStatus {
        status: "ok".to_string(),
        api_configured: config.is_analysis_configured(),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn require_upload(upload: Option<RawUpload>) -> Result<RawUpload, MedScanError> {
    let upload = upload.ok_or(MedScanError::NoFileProvided)?;
    if upload.filename.is_empty() {
        return Err(MedScanError::NoFileSelected);
    }
    Ok(upload)
}

/// Decode and resize on the blocking pool.
async fn prepare_blocking(upload: RawUpload, width: u32) -> Result<DynamicImage, MedScanError> {
    tokio::task::spawn_blocking(move || prepare_image(&upload, width))
        .await
        .map_err(|e| MedScanError::Internal(format!("Decode task panicked: {}", e)))?
}

/// Resolve the reasoning service, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.service`), used as-is.
/// 2. **Credential + named provider**: without a credential the analysis
///    boundary is unavailable and fails with
///    [`MedScanError::NotConfigured`]; with one, the provider is built from
///    that credential and `config.model`.
fn resolve_service(config: &MedScanConfig) -> Result<Arc<dyn ReasoningService>, MedScanError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    let key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| MedScanError::NotConfigured {
            provider: config.provider_name.clone(),
            hint: "Please set GEMINI_API_KEY (or GOOGLE_API_KEY).".to_string(),
        })?;

    let provider = build_provider(&config.provider_name, &config.model, key)?;
    Ok(Arc::new(LlmReasoningService::new(provider)))
}

/// Build a key-authenticated `edgequake_llm` provider.
///
/// The configured credential is handed to the provider directly; nothing is
/// re-read from the environment. Providers without an API key (local
/// runtimes, cloud SDK auth) are supplied pre-built through
/// [`crate::config::MedScanConfigBuilder::llm_provider`].
fn build_provider(
    name: &str,
    model: &str,
    key: &str,
) -> Result<Arc<dyn LLMProvider>, MedScanError> {
    let provider: Arc<dyn LLMProvider> = match name.to_ascii_lowercase().as_str() {
        DEFAULT_PROVIDER => Arc::new(GeminiProvider::new(key).with_model(model)),
        "openai" => Arc::new(OpenAIProvider::new(key).with_model(model)),
        "anthropic" => Arc::new(AnthropicProvider::new(key).with_model(model)),
        "openrouter" => Arc::new(OpenRouterProvider::new(key).with_model(model)),
        other => {
            return Err(MedScanError::NotConfigured {
                provider: other.to_string(),
                hint: "This provider does not take an API key; pass a pre-built provider \
                       with MedScanConfigBuilder::llm_provider."
                    .to_string(),
            })
        }
    };
    debug!("Built {} provider for {}", provider.name(), provider.model());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn missing_file_is_reported_before_decoding() {
        let err = preview_upload(None, &MedScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedScanError::NoFileProvided));
    }

    #[tokio::test]
    async fn empty_filename_means_no_file_selected() {
        let err = preview_upload(Some(RawUpload::new("", vec![1, 2, 3])), &MedScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedScanError::NoFileSelected));
    }

    #[tokio::test]
    async fn analysis_without_credential_is_a_configuration_error() {
        // Even an undecodable upload reports the configuration problem first.
        let upload = RawUpload::new("scan.png", b"garbage".to_vec());
        let err = analyze_upload(Some(upload), &MedScanConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn export_without_image_is_rejected() {
        let req = ExportRequest {
            analysis: Some("# Findings".into()),
            image_base64: None,
        };
        let err = export_report(&req, &MedScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedScanError::MissingField { field: "image" }));
    }

    #[tokio::test]
    async fn export_without_analysis_is_rejected() {
        let req = ExportRequest {
            analysis: None,
            image_base64: Some("data:image/png;base64,AAAA".into()),
        };
        let err = export_report(&req, &MedScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedScanError::MissingField { field: "analysis" }));
    }

    #[test]
    fn configured_key_reaches_the_gemini_provider() {
        // The key is set only through the builder; the provider must not
        // need any environment variable to be built.
        let provider = build_provider("Gemini", "gemini-2.5-flash", "AIza-test-key").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-2.5-flash");
    }

    #[test]
    fn builder_key_resolves_a_service() {
        let config = MedScanConfig::builder()
            .api_key("AIza-test-key")
            .build()
            .unwrap();
        assert!(health(&config).api_configured);
        assert!(resolve_service(&config).is_ok());
    }

    #[test]
    fn keyed_providers_use_the_configured_model() {
        let openai = build_provider("openai", "gpt-4.1-mini", "sk-test").unwrap();
        assert_eq!((openai.name(), openai.model()), ("openai", "gpt-4.1-mini"));
        let anthropic = build_provider("anthropic", "claude-sonnet-4", "sk-ant-test").unwrap();
        assert_eq!(anthropic.name(), "anthropic");
    }

    #[test]
    fn keyless_provider_name_is_a_configuration_error() {
        let err = build_provider("ollama", "llava", "unused").err().expect("expected an error");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn health_reports_configuration() {
        assert!(!health(&MedScanConfig::default()).api_configured);
        let configured = MedScanConfig::builder().api_key("k").build().unwrap();
        let status = health(&configured);
        assert_eq!(status.status, "ok");
        assert!(status.api_configured);
    }

    #[test]
    fn upload_reads_stream_once() {
        let upload = RawUpload::from_reader("a.png", &b"abc"[..]).unwrap();
        assert_eq!(upload.bytes, b"abc");
        assert_eq!(upload.filename, "a.png");
    }
}
