#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use assess_flow::{FlowError, Poller, Result, SampledFrame, Shot, VideoInsights};
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

use infant_health_service::{
    AppState, ServiceConfig, build_router,
    media::FrameSampler,
    models::UploadedMedia,
    providers::{ChatCompletion, ChatRequest, VideoAnalyzer, VideoIndexerClient},
};

pub const BOUNDARY: &str = "infant-health-test-boundary";

/// Chat provider double: fixed reply, call counter, last request.
pub struct StubChat {
    reply: String,
    configured: bool,
    calls: AtomicUsize,
    last: Mutex<Option<ChatRequest>>,
}

impl StubChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            configured: true,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for StubChat {
    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(FlowError::NotConfigured(
                "Azure OpenAI API key not configured. Please set AZURE_OPENAI_API_KEY in your .env file."
                    .to_string(),
            ))
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        Ok(self.reply.clone())
    }
}

/// Video analyzer double returning two shots ending at 3.5s and 9.0s.
#[derive(Default)]
pub struct StubVideo {
    failure: Option<fn() -> FlowError>,
    calls: AtomicUsize,
}

impl StubVideo {
    pub fn failing(failure: fn() -> FlowError) -> Self {
        Self {
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoAnalyzer for StubVideo {
    fn ensure_configured(&self) -> Result<()> {
        Ok(())
    }

    async fn analyze(&self, _video: &UploadedMedia) -> Result<VideoInsights> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(VideoInsights::new(
            vec![],
            vec![],
            vec![
                Shot {
                    start_time: 0.0,
                    end_time: 3.5,
                },
                Shot {
                    start_time: 3.5,
                    end_time: 9.0,
                },
            ],
            vec![],
        ))
    }
}

/// Frame sampler double producing `count` tiny frames.
pub struct StubFrames;

#[async_trait]
impl FrameSampler for StubFrames {
    async fn sample(&self, _video: &[u8], count: usize) -> Result<Vec<SampledFrame>> {
        Ok((0..count as u64)
            .map(|n| SampledFrame {
                frame_number: n,
                timestamp: n as f64 / 30.0,
                image: format!("frame-{n}"),
            })
            .collect())
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> ServiceConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("AZURE_OPENAI_API_KEY".to_string(), "test-openai-secret".to_string()),
        ("GCP_PROJECT_ID".to_string(), "infant-health-test".to_string()),
        ("GCP_ACCESS_TOKEN".to_string(), "test-gcp-secret".to_string()),
        ("AZURE_VIDEO_INDEXER_KEY".to_string(), "test-indexer-secret".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    ServiceConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub chat: Arc<StubChat>,
    pub video: Arc<StubVideo>,
}

pub fn build_test_app(chat: StubChat, video: StubVideo) -> TestApp {
    build_test_app_with_config(test_config(&[]), chat, video)
}

pub fn build_test_app_with_config(
    config: ServiceConfig,
    chat: StubChat,
    video: StubVideo,
) -> TestApp {
    let chat = Arc::new(chat);
    let video = Arc::new(video);
    let indexer = Arc::new(VideoIndexerClient::new(
        reqwest::Client::new(),
        config.indexer.clone(),
        Poller::default(),
    ));

    let state = AppState {
        config: Arc::new(config),
        chat: chat.clone(),
        video: video.clone(),
        frames: Arc::new(StubFrames),
        indexer,
    };

    TestApp {
        router: build_router(state),
        chat,
        video,
    }
}

/// Encode a single-field multipart body.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn png_bytes() -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([220, 120, 110])))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub async fn upload(
    app: Router,
    uri: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Response<Body> {
    let request = Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body("file", file_name, content_type, data)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}
