//! Clients for the third-party services an assessment depends on.

pub mod azure_openai;
pub mod video_indexer;
pub mod video_intelligence;

use assess_flow::{FlowError, Result, VideoInsights};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::models::UploadedMedia;

pub use azure_openai::AzureOpenAiClient;
pub use video_indexer::VideoIndexerClient;
pub use video_intelligence::VideoIntelligenceClient;

pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// One multimodal chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Base64 JPEG images attached after the user prompt.
    pub images: Vec<String>,
    pub temperature: f64,
}

/// A chat-completion provider returning a single free-text reply.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Fails with [`FlowError::NotConfigured`] when credentials are missing.
    fn ensure_configured(&self) -> Result<()>;

    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

/// Produces detection insights for an uploaded video.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    fn ensure_configured(&self) -> Result<()>;

    async fn analyze(&self, video: &UploadedMedia) -> Result<VideoInsights>;
}

pub(crate) fn transport(error: reqwest::Error) -> FlowError {
    FlowError::Transport(error.to_string())
}

/// Turn a non-success response into a provider error carrying the body text.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FlowError::provider(status.as_u16(), body))
}

/// Check the status, then decode the body as JSON.
///
/// A body that arrives but does not decode is a provider error, not a transport one.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = ensure_success(response).await?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(transport)?;

    serde_json::from_slice(&body)
        .map_err(|e| FlowError::provider(status, format!("Malformed response body: {}", e)))
}
