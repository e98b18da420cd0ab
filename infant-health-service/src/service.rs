use std::sync::Arc;
use std::time::Duration;

use assess_flow::{PollPolicy, Poller};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::{
    assessments::{
        DeviceReadingTask, FacialDysmorphologyTask, ImageAssessment, PostureTask, SkinTask,
        run_image_assessment, run_video_assessment,
    },
    config::{ServiceConfig, VideoBackend},
    error::{AppError, AppResult},
    media::{FfmpegFrameSampler, FrameSampler, normalize_image, synthetic_face},
    models::{
        DeviceReading, FacialDysmorphologyReport, MediaKind, PostureReport, SkinAssessment,
        UploadedMedia, VideoHealthReport,
    },
    providers::{
        AzureOpenAiClient, ChatCompletion, VideoAnalyzer, VideoIndexerClient,
        VideoIntelligenceClient,
    },
};

const SERVICE_NAME: &str = "health-assessment-api";
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub chat: Arc<dyn ChatCompletion>,
    pub video: Arc<dyn VideoAnalyzer>,
    pub frames: Arc<dyn FrameSampler>,
    /// Kept separately for the indexer diagnostics endpoint.
    pub indexer: Arc<VideoIndexerClient>,
}

impl AppState {
    /// Build the provider clients once; they are shared by every request.
    pub fn from_config(config: ServiceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;

        let indexer_poller =
            Poller::new(PollPolicy::new(config.poll_interval, config.poll_timeout));
        let operation_poller = Poller::new(PollPolicy::new(
            config.poll_interval,
            config.gcp.operation_timeout,
        ));

        let chat = Arc::new(AzureOpenAiClient::new(http.clone(), config.openai.clone()));
        let indexer = Arc::new(VideoIndexerClient::new(
            http.clone(),
            config.indexer.clone(),
            indexer_poller,
        ));
        let video: Arc<dyn VideoAnalyzer> = match config.video_backend {
            VideoBackend::Gcp => Arc::new(VideoIntelligenceClient::new(
                http,
                config.gcp.clone(),
                operation_poller,
            )),
            VideoBackend::Indexer => indexer.clone(),
        };

        Ok(Self {
            config: Arc::new(config),
            chat,
            video,
            frames: Arc::new(FfmpegFrameSampler::default()),
            indexer,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
        .max_age(PREFLIGHT_MAX_AGE);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/assess-skin", post(assess_skin))
        .route(
            "/analyze-facial-dysmorphology",
            post(analyze_facial_dysmorphology),
        )
        .route("/analyze-posture", post(analyze_posture))
        .route("/analyze-video-health", post(analyze_video_health))
        .route("/extract-medical-readings", post(extract_medical_readings))
        .route("/test-facial-analysis", get(test_facial_analysis))
        .route("/test-video-indexer", get(test_video_indexer))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .layer(from_fn(preflight_middleware))
        .with_state(state)
}

/// Tag every request with a fresh correlation id and run it inside a span.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

/// Answer any `OPTIONS` request directly, whatever the path.
async fn preflight_middleware(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }

    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                "GET, POST, PUT, DELETE, OPTIONS",
            ),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
            (header::ACCESS_CONTROL_MAX_AGE, "3600"),
        ],
    )
        .into_response()
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Infant Health Assessment API",
        "status": "running"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Non-secret configuration. Secrets are reported only as booleans.
async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "azure_endpoint": config.openai.endpoint,
        "model": config.openai.model,
        "deployment": config.openai.deployment,
        "api_version": config.openai.api_version,
        "api_key_configured": config.openai.api_key_configured(),
        "video_backend": config.video_backend,
        "gcp_project_configured": config.gcp.project_id.is_some(),
        "video_indexer_configured": config.indexer.key.is_some(),
        "video_indexer_location": config.indexer.location,
        "server_host": config.host,
        "server_port": config.port,
        "debug_mode": config.debug
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn assess_skin(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<SkinAssessment>> {
    assess_image(&state, multipart, &SkinTask).await
}

async fn analyze_facial_dysmorphology(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FacialDysmorphologyReport>> {
    assess_image(&state, multipart, &FacialDysmorphologyTask).await
}

async fn analyze_posture(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<PostureReport>> {
    assess_image(&state, multipart, &PostureTask).await
}

async fn extract_medical_readings(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DeviceReading>> {
    assess_image(&state, multipart, &DeviceReadingTask).await
}

async fn assess_image<A: ImageAssessment>(
    state: &AppState,
    multipart: Multipart,
    assessment: &A,
) -> AppResult<Json<A::Report>> {
    state.chat.ensure_configured()?;
    let upload = read_upload(multipart, MediaKind::Image).await?;

    let report = run_image_assessment(assessment, state.chat.as_ref(), &upload).await?;
    Ok(Json(report))
}

async fn analyze_video_health(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<VideoHealthReport>> {
    state.chat.ensure_configured()?;
    state.video.ensure_configured()?;
    let upload = read_upload(multipart, MediaKind::Video).await?;

    let report = run_video_assessment(
        state.chat.as_ref(),
        state.video.as_ref(),
        state.frames.as_ref(),
        state.config.frame_samples,
        &upload,
    )
    .await?;
    Ok(Json(report))
}

/// Take the upload from the `file` field, or the first field carrying a file name.
///
/// The declared MIME type is checked before the body is read.
async fn read_upload(mut multipart: Multipart, kind: MediaKind) -> AppResult<UploadedMedia> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with(kind.mime_prefix()) {
            warn!(content_type = %content_type, "Rejected upload with wrong media type");
            return Err(AppError::bad_request(kind.rejection()));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        info!(file_name = %file_name, size = bytes.len(), "Upload received");
        return Ok(UploadedMedia {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::bad_request("No file uploaded"))
}

/// Exercise the image pipeline on a synthetic face. No provider is called.
async fn test_facial_analysis(State(state): State<AppState>) -> Json<Value> {
    let openai = &state.config.openai;
    if !openai.api_key_configured() {
        return Json(json!({
            "status": "error",
            "message": "Azure OpenAI API key not configured",
            "api_key_configured": false
        }));
    }

    let outcome = synthetic_face().and_then(|image| {
        let encoded = normalize_image(&image)?;
        Ok((image.len(), encoded.len()))
    });

    match outcome {
        Ok((image_size, base64_length)) => Json(json!({
            "status": "success",
            "message": "Test image created successfully",
            "api_key_configured": true,
            "test_image_size": image_size,
            "base64_length": base64_length,
            "azure_endpoint": openai.endpoint,
            "model": openai.deployment
        })),
        Err(e) => Json(json!({
            "status": "error",
            "message": format!("Test failed: {}", e),
            "api_key_configured": true
        })),
    }
}

/// Report indexer configuration and try one token acquisition.
async fn test_video_indexer(State(state): State<AppState>) -> Json<Value> {
    let indexer = state.indexer.config();

    if let Err(e) = state.indexer.ensure_configured() {
        return Json(json!({
            "status": "error",
            "message": e.to_string(),
            "video_indexer_configured": false
        }));
    }

    let configuration = json!({
        "location": indexer.location,
        "account_id": indexer.account_id,
        "key_configured": indexer.key.is_some(),
        "account_id_configured": indexer.account_id.is_some()
    });

    match state.indexer.access_token().await {
        Ok(_) => Json(json!({
            "status": "success",
            "message": "Video Indexer is properly configured and accessible",
            "video_indexer_configured": true,
            "configuration": configuration,
            "access_token_test": "success"
        })),
        Err(e) => {
            warn!(error = %e, "Video indexer token test failed");
            Json(json!({
                "status": "error",
                "message": "Video Indexer access token test failed",
                "video_indexer_configured": true,
                "configuration": configuration,
                "access_token_test": "failed",
                "error": e.to_string()
            }))
        }
    }
}
