//! Configuration for the imaging, analysis and export boundaries.
//!
//! Everything tunable lives in [`MedScanConfig`], built via its
//! [`MedScanConfigBuilder`]. The configuration is read-only once built and is
//! shared by reference between concurrent requests; nothing in the pipeline
//! mutates it.
//!
//! The analysis prompt is deliberately absent: it is fixed for the lifetime
//! of the process (see [`crate::prompts`]).

use crate::error::MedScanError;
use crate::pipeline::llm::{LlmReasoningService, ReasoningService};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration shared by all boundaries.
///
/// # Example
/// ```rust
/// use medscan_report::MedScanConfig;
///
/// let config = MedScanConfig::builder()
///     .api_key("test-key")
///     .preview_width(400)
///     .build()
///     .unwrap();
/// assert!(config.is_analysis_configured());
/// ```
#[derive(Clone)]
pub struct MedScanConfig {
    /// Credential gating the analysis boundary. `None` means "not configured".
    /// It is the key the provider authenticates with.
    pub api_key: Option<String>,

    /// Key-authenticated provider: `gemini`, `openai`, `anthropic` or
    /// `openrouter`. Default: `gemini`.
    pub provider_name: String,

    /// Vision model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// Pre-constructed reasoning service. Takes precedence over
    /// `provider_name`/`model` and counts as configured.
    pub service: Option<Arc<dyn ReasoningService>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// The four-section report routinely runs past 1 500 tokens.
    pub max_tokens: usize,

    /// Width in pixels of the normalised image (preview and analysis). Default: 500.
    pub preview_width: u32,

    /// Display width of the embedded picture in the exported document. Default: 5.0.
    pub report_image_width_inches: f32,

    /// How transient analysis artifacts are released.
    pub cleanup: CleanupPolicy,

    /// Directory for transient analysis artifacts. `None` uses the system
    /// temp directory.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for MedScanConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            service: None,
            temperature: 0.1,
            max_tokens: 4096,
            preview_width: 500,
            report_image_width_inches: 5.0,
            cleanup: CleanupPolicy::default(),
            artifact_dir: None,
        }
    }
}

impl fmt::Debug for MedScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MedScanConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field(
                "service",
                &self.service.as_ref().map(|_| "<dyn ReasoningService>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("preview_width", &self.preview_width)
            .field("report_image_width_inches", &self.report_image_width_inches)
            .field("cleanup", &self.cleanup)
            .field("artifact_dir", &self.artifact_dir)
            .finish()
    }
}

impl MedScanConfig {
    /// Create a new builder for `MedScanConfig`.
    pub fn builder() -> MedScanConfigBuilder {
        MedScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// The credential is read from `GEMINI_API_KEY`, falling back to
    /// `GOOGLE_API_KEY`. `MEDSCAN_PROVIDER` and `MEDSCAN_MODEL` override the
    /// provider and model. A missing credential is not an error here: it is
    /// reported when the analysis boundary is called.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty());
        if let Ok(p) = std::env::var("MEDSCAN_PROVIDER") {
            if !p.is_empty() {
                config.provider_name = p;
            }
        }
        if let Ok(m) = std::env::var("MEDSCAN_MODEL") {
            if !m.is_empty() {
                config.model = m;
            }
        }
        config
    }

    /// Whether the analysis boundary can be attempted at all.
    pub fn is_analysis_configured(&self) -> bool {
        self.service.is_some()
            || self
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty())
    }
}

/// Builder for [`MedScanConfig`].
#[derive(Debug)]
pub struct MedScanConfigBuilder {
    config: MedScanConfig,
}

impl MedScanConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn service(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.config.service = Some(service);
        self
    }

    /// Wrap a pre-built `edgequake_llm` provider as the reasoning service.
    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.service = Some(Arc::new(LlmReasoningService::new(provider)));
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn preview_width(mut self, px: u32) -> Self {
        self.config.preview_width = px;
        self
    }

    pub fn report_image_width_inches(mut self, inches: f32) -> Self {
        self.config.report_image_width_inches = inches;
        self
    }

    pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.config.cleanup = policy;
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MedScanConfig, MedScanError> {
        let c = &self.config;
        if c.preview_width == 0 {
            return Err(MedScanError::InvalidConfig(
                "Preview width must be ≥ 1 px".into(),
            ));
        }
        if !(c.report_image_width_inches > 0.0 && c.report_image_width_inches <= 20.0) {
            return Err(MedScanError::InvalidConfig(format!(
                "Report image width must be in (0, 20] inches, got {}",
                c.report_image_width_inches
            )));
        }
        if c.max_tokens == 0 {
            return Err(MedScanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.cleanup.attempts == 0 {
            return Err(MedScanError::InvalidConfig(
                "Cleanup attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Bounded-retry policy for deleting transient artifacts.
///
/// Some platforms keep a file locked for a short while after the last handle
/// is closed; deletion is retried `attempts` times, sleeping `backoff_ms`
/// between tries, before the path is deferred to process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 100,
        }
    }
}
