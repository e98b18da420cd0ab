//! Video-intelligence provider: one annotate request, then a long-running
//! operation polled to completion.

use assess_flow::{
    FlowError, JobSnapshot, JobState, Label, Poller, RemoteJob, Result, Shot, Track,
    TrackTimestamp, VideoInsights,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{VideoAnalyzer, read_json, transport};
use crate::{config::GcpConfig, models::UploadedMedia};

const FEATURES: [&str; 4] = [
    "FACE_DETECTION",
    "PERSON_DETECTION",
    "LABEL_DETECTION",
    "SHOT_CHANGE_DETECTION",
];

pub struct VideoIntelligenceClient {
    http: Client,
    config: GcpConfig,
    poller: Poller,
}

impl VideoIntelligenceClient {
    pub fn new(http: Client, config: GcpConfig, poller: Poller) -> Self {
        Self {
            http,
            config,
            poller,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.config.access_token.as_deref().unwrap_or_default();
        let project = self.config.project_id.as_deref().unwrap_or_default();
        request
            .bearer_auth(token)
            .header("x-goog-user-project", project)
    }

    /// Submit the video and return the operation name.
    async fn start_annotation(&self, video: &UploadedMedia) -> Result<String> {
        let payload = json!({
            "inputContent": STANDARD.encode(&video.bytes),
            "features": FEATURES,
        });

        info!(
            file_name = %video.file_name,
            size = video.bytes.len(),
            "Sending video to video-intelligence provider"
        );

        let response = self
            .authorized(self.http.post(self.url("videos:annotate")))
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let operation: Operation = read_json(response).await?;

        Ok(operation.name)
    }
}

#[async_trait]
impl VideoAnalyzer for VideoIntelligenceClient {
    fn ensure_configured(&self) -> Result<()> {
        if self.config.project_id.is_none() {
            return Err(FlowError::NotConfigured(
                "GCP Project ID not configured. Please set GCP_PROJECT_ID in your .env file."
                    .to_string(),
            ));
        }
        if self.config.access_token.is_none() {
            return Err(FlowError::NotConfigured(
                "GCP access token not configured. Please set GCP_ACCESS_TOKEN in your .env file."
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn analyze(&self, video: &UploadedMedia) -> Result<VideoInsights> {
        self.ensure_configured()?;

        let name = self.start_annotation(video).await?;
        let operation = AnnotateOperation { client: self, name };
        let response = self.poller.wait_for(&operation).await?;

        let insights = response.into_insights();
        info!(
            duration = insights.duration,
            faces = insights.faces.len(),
            persons = insights.persons.len(),
            shots = insights.shots.len(),
            labels = insights.labels.len(),
            "Video-intelligence analysis completed"
        );
        Ok(insights)
    }
}

/// The long-running annotate operation, seen as a remote job.
struct AnnotateOperation<'a> {
    client: &'a VideoIntelligenceClient,
    name: String,
}

#[async_trait]
impl RemoteJob for AnnotateOperation<'_> {
    type Output = AnnotateVideoResponse;

    fn id(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<JobSnapshot<AnnotateVideoResponse>> {
        let response = self
            .client
            .authorized(self.client.http.get(self.client.url(&self.name)))
            .send()
            .await
            .map_err(transport)?;

        let operation: Operation = read_json(response).await?;

        Ok(operation.into_snapshot())
    }
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<AnnotateVideoResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

impl Operation {
    fn into_snapshot(self) -> JobSnapshot<AnnotateVideoResponse> {
        if !self.done {
            return JobSnapshot::pending(JobState::Processing);
        }
        match self.error {
            Some(error) => JobSnapshot::failed(error.message),
            None => JobSnapshot::processed(self.response.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnotateVideoResponse {
    #[serde(default)]
    annotation_results: Vec<AnnotationResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnnotationResult {
    face_detection_annotations: Vec<DetectionAnnotation>,
    person_detection_annotations: Vec<DetectionAnnotation>,
    shot_annotations: Vec<VideoSegment>,
    segment_label_annotations: Vec<LabelAnnotation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetectionAnnotation {
    tracks: Vec<ApiTrack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiTrack {
    confidence: f64,
    timestamped_objects: Vec<TimestampedObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TimestampedObject {
    time_offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoSegment {
    start_time_offset: Option<String>,
    end_time_offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelAnnotation {
    entity: Entity,
    segments: Vec<LabelSegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Entity {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelSegment {
    segment: VideoSegment,
    confidence: f64,
}

impl AnnotateVideoResponse {
    fn into_insights(self) -> VideoInsights {
        let mut faces = Vec::new();
        let mut persons = Vec::new();
        let mut shots = Vec::new();
        let mut labels = Vec::new();

        for result in self.annotation_results {
            faces.extend(tracks(result.face_detection_annotations));
            persons.extend(tracks(result.person_detection_annotations));
            shots.extend(result.shot_annotations.iter().map(|segment| Shot {
                start_time: parse_offset(segment.start_time_offset.as_deref()),
                end_time: parse_offset(segment.end_time_offset.as_deref()),
            }));
            for label in result.segment_label_annotations {
                labels.extend(label.segments.iter().map(|s| Label {
                    description: label.entity.description.clone(),
                    confidence: s.confidence,
                    start_time: parse_offset(s.segment.start_time_offset.as_deref()),
                    end_time: parse_offset(s.segment.end_time_offset.as_deref()),
                }));
            }
        }

        VideoInsights::new(faces, persons, shots, labels)
    }
}

fn tracks(annotations: Vec<DetectionAnnotation>) -> impl Iterator<Item = Track> {
    annotations
        .into_iter()
        .flat_map(|annotation| annotation.tracks)
        .map(|track| Track {
            confidence: track.confidence,
            timestamps: track
                .timestamped_objects
                .iter()
                .map(|object| TrackTimestamp {
                    time: parse_offset(object.time_offset.as_deref()),
                    confidence: track.confidence,
                })
                .collect(),
        })
}

/// Parse a protobuf JSON duration such as `"3.500s"`; absent or malformed → 0.
fn parse_offset(offset: Option<&str>) -> f64 {
    offset
        .and_then(|raw| raw.trim().strip_suffix('s'))
        .and_then(|secs| secs.parse::<f64>().ok())
        .unwrap_or(0.0)
}
