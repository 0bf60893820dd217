use async_trait::async_trait;
use rig::completion::message::{Image, ImageMediaType};
use rig::completion::{Chat, Message};
use rig::message::ContentFormat;
use rig::providers::anthropic;
use std::time::Duration;
use tracing::info;

use super::preparer::{ImageKind, PreparedImage};
use crate::config::Config;
use crate::error::{model_error, CalResult};

/// Default Anthropic model for flyer extraction
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
/// Per-call timeout for the model request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound on reply length
pub const DEFAULT_MAX_TOKENS: u64 = 2048;

/// A vision-language model that answers one image with one text reply
#[async_trait]
pub trait VisionModel: Send + Sync + 'static {
    /// Send `system_prompt` and a single image, returning the reply text
    /// untouched. Each call is independent of every other.
    async fn invoke(&self, system_prompt: &str, image: &PreparedImage) -> CalResult<String>;
}

/// Claude through rig's Anthropic provider
pub struct AnthropicVision {
    client: anthropic::Client,
    model: String,
    max_tokens: u64,
    timeout: Duration,
}

impl AnthropicVision {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: anthropic::ClientBuilder::new(api_key).build(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.anthropic_api_key, &config.model)
            .with_max_tokens(config.model_max_tokens)
            .with_timeout(Duration::from_secs(config.model_timeout_secs))
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn media_type(kind: ImageKind) -> ImageMediaType {
    match kind {
        ImageKind::Jpeg => ImageMediaType::JPEG,
        ImageKind::Png => ImageMediaType::PNG,
        ImageKind::Webp => ImageMediaType::WEBP,
        ImageKind::Gif => ImageMediaType::GIF,
    }
}

#[async_trait]
impl VisionModel for AnthropicVision {
    async fn invoke(&self, system_prompt: &str, image: &PreparedImage) -> CalResult<String> {
        info!("Sending {} image to {}", image.media_type(), self.model);

        let agent = self
            .client
            .agent(&self.model)
            .preamble(system_prompt)
            .max_tokens(self.max_tokens)
            .temperature(0.0)
            .build();

        let image_message = Message::from(Image {
            data: image.data.clone(),
            media_type: Some(media_type(image.kind)),
            format: Some(ContentFormat::Base64),
            detail: None,
        });

        let response = tokio::time::timeout(self.timeout, agent.chat(image_message, Vec::new()))
            .await
            .map_err(|_| {
                model_error(&format!(
                    "No reply from {} within {}s",
                    self.model,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| model_error(&format!("Failed to complete request: {}", e)))?;

        info!("Received {} characters from {}", response.len(), self.model);
        Ok(response)
    }
}
