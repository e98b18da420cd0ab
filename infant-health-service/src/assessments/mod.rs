//! Assessment definitions: prompts, expected schema and the shared
//! upload → chat completion → recovery pipeline.

pub mod facial;
pub mod posture;
pub mod readings;
pub mod skin;
pub mod video;

use assess_flow::{Recoverable, Result, recover};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    media::normalize_image,
    models::UploadedMedia,
    providers::{ChatCompletion, ChatRequest, DEFAULT_TEMPERATURE},
};

pub use facial::FacialDysmorphologyTask;
pub use posture::PostureTask;
pub use readings::DeviceReadingTask;
pub use skin::SkinTask;
pub use video::{VideoHealthTask, run_video_assessment};

/// A single-image assessment.
pub trait ImageAssessment: Send + Sync {
    type Report: Recoverable + Serialize + Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn system_prompt(&self) -> &'static str;

    fn user_prompt(&self) -> &'static str;

    fn temperature(&self) -> f64 {
        DEFAULT_TEMPERATURE
    }
}

/// Normalize the image, ask the chat provider, and recover the typed report.
///
/// Replies that cannot be parsed produce the report's fallback, never an error.
pub async fn run_image_assessment<A: ImageAssessment>(
    assessment: &A,
    chat: &dyn ChatCompletion,
    upload: &UploadedMedia,
) -> Result<A::Report> {
    let image = normalize_image(&upload.bytes)?;

    info!(
        assessment = assessment.name(),
        file_name = %upload.file_name,
        image_bytes = upload.bytes.len(),
        base64_len = image.len(),
        "Running image assessment"
    );

    let reply = chat
        .complete(ChatRequest {
            system_prompt: assessment.system_prompt().to_string(),
            user_prompt: assessment.user_prompt().to_string(),
            images: vec![image],
            temperature: assessment.temperature(),
        })
        .await?;

    let recovered = recover::<A::Report>(&reply);
    if recovered.is_fallback() {
        warn!(assessment = assessment.name(), "Returning fallback report");
    } else {
        info!(assessment = assessment.name(), "Assessment parsed");
    }

    Ok(recovered.into_inner())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use assess_flow::Result;
    use async_trait::async_trait;

    use crate::providers::{ChatCompletion, ChatRequest};

    /// Chat provider that replays a fixed reply and records requests.
    pub struct CannedChat {
        reply: String,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl CannedChat {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatCompletion for CannedChat {
        fn ensure_configured(&self) -> Result<()> {
            Ok(())
        }

        async fn complete(&self, request: ChatRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }
}
