//! Reasoning-service interaction: one prompt + one image → markdown text.
//!
//! [`ReasoningService`] is the seam between the pipeline and whatever model
//! answers. The production implementation, [`LlmReasoningService`], forwards
//! to an `edgequake_llm` provider; tests plug in a scripted stub.
//!
//! An analysis call is never retried: a failed or empty answer is reported
//! to the caller as-is. The only retries in the analysis path concern
//! deleting the transient artifact (see [`crate::pipeline::artifact`]).

use crate::config::MedScanConfig;
use crate::error::MedScanError;
use crate::prompts::MEDICAL_ANALYSIS_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Raw answer from a reasoning service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceReply {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Something that can look at an image and answer a prompt.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send `prompt` with one image attachment and return the reply.
    async fn analyze(
        &self,
        prompt: &str,
        image: ImageData,
        options: &CompletionOptions,
    ) -> Result<ServiceReply, MedScanError>;
}

/// [`ReasoningService`] backed by an `edgequake_llm` provider.
pub struct LlmReasoningService {
    provider: Arc<dyn LLMProvider>,
}

impl LlmReasoningService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ReasoningService for LlmReasoningService {
    async fn analyze(
        &self,
        prompt: &str,
        image: ImageData,
        options: &CompletionOptions,
    ) -> Result<ServiceReply, MedScanError> {
        debug!(
            "Calling {}/{}",
            self.provider.name(),
            self.provider.model()
        );
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];
        let response = self
            .provider
            .chat(&messages, Some(options))
            .await
            .map_err(|e| MedScanError::AnalysisFailed {
                detail: e.to_string(),
            })?;

        Ok(ServiceReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens as u64,
            completion_tokens: response.completion_tokens as u64,
        })
    }
}

/// Send the fixed medical prompt with `image` to `service`.
///
/// Fails with [`MedScanError::AnalysisFailed`] on service errors; the reply
/// content is returned untouched.
pub async fn request_analysis(
    service: &Arc<dyn ReasoningService>,
    image: ImageData,
    config: &MedScanConfig,
) -> Result<ServiceReply, MedScanError> {
    let start = Instant::now();
    let options = build_options(config);
    info!("Requesting analysis ({} chars of image data)", image.data.len());

    let reply = service
        .analyze(MEDICAL_ANALYSIS_PROMPT, image, &options)
        .await?;

    debug!(
        "Analysis: {} input tokens, {} output tokens, {}ms",
        reply.prompt_tokens,
        reply.completion_tokens,
        start.elapsed().as_millis()
    );
    Ok(reply)
}

/// Build `CompletionOptions` from the configuration.
fn build_options(config: &MedScanConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
