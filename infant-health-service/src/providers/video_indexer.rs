//! Legacy video-indexer provider: upload, then poll the index until the
//! remote job reaches a terminal state.

use assess_flow::{
    FlowError, JobSnapshot, JobState, Label, Poller, RemoteJob, Result, Shot, Track,
    TrackTimestamp, VideoInsights,
};
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{VideoAnalyzer, read_json, transport};
use crate::{config::IndexerConfig, models::UploadedMedia};

pub struct VideoIndexerClient {
    http: Client,
    config: IndexerConfig,
    poller: Poller,
}

impl VideoIndexerClient {
    pub fn new(http: Client, config: IndexerConfig, poller: Poller) -> Self {
        Self {
            http,
            config,
            poller,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.location,
            self.config.account_id.as_deref().unwrap_or_default(),
            path
        )
    }

    /// Obtain a bearer token. Trial accounts exchange the subscription key
    /// at the auth endpoint; provisioned accounts use the key as-is.
    pub async fn access_token(&self) -> Result<String> {
        self.ensure_configured()?;
        let key = self.config.key.as_deref().unwrap_or_default();

        if !self.config.is_trial() {
            debug!(location = %self.config.location, "Using configured key for paid account");
            return Ok(key.to_string());
        }

        let url = format!(
            "{}/auth/{}/Accounts/{}/AccessToken",
            self.config.base_url.trim_end_matches('/'),
            self.config.location,
            self.config.account_id.as_deref().unwrap_or_default()
        );

        let response = self
            .http
            .get(url)
            .query(&[("allowEdit", "true")])
            .header("Ocp-Apim-Subscription-Key", key)
            .send()
            .await
            .map_err(|e| FlowError::TokenAcquisition(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::TokenAcquisition(format!(
                "Failed to get Video Indexer access token ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: String = response
            .json()
            .await
            .map_err(|e| FlowError::TokenAcquisition(format!("Malformed token response: {}", e)))?;

        debug!("Trial access token obtained");
        Ok(token)
    }

    /// Upload the video and return the id the indexer assigned to it.
    async fn upload(&self, video: &UploadedMedia) -> Result<String> {
        let token = self.access_token().await?;

        let part = Part::bytes(video.bytes.to_vec())
            .file_name(video.file_name.clone())
            .mime_str(&video.content_type)
            .map_err(transport)?;
        let form = Form::new().part("file", part);

        info!(
            file_name = %video.file_name,
            size = video.bytes.len(),
            "Uploading video to indexer"
        );

        let response = self
            .http
            .post(self.account_url("Videos"))
            .query(&[("name", video.file_name.as_str()), ("privacy", "private")])
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let uploaded: UploadResponse = read_json(response).await?;

        info!(video_id = %uploaded.id, "Video uploaded");
        Ok(uploaded.id)
    }
}

#[async_trait]
impl VideoAnalyzer for VideoIndexerClient {
    fn ensure_configured(&self) -> Result<()> {
        if self.config.key.is_none() {
            return Err(FlowError::NotConfigured(
                "Azure Video Indexer key not configured. Please set AZURE_VIDEO_INDEXER_KEY in your .env file."
                    .to_string(),
            ));
        }
        if self.config.account_id.is_none() {
            return Err(FlowError::NotConfigured(
                "Azure Video Indexer account ID not configured. Please set AZURE_VIDEO_INDEXER_ACCOUNT_ID in your .env file."
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn analyze(&self, video: &UploadedMedia) -> Result<VideoInsights> {
        self.ensure_configured()?;

        let video_id = self.upload(video).await?;
        let job = IndexerJob {
            client: self,
            video_id,
        };
        let index = self.poller.wait_for(&job).await?;

        Ok(index.into_insights())
    }
}

/// An uploaded video whose index is still being built.
struct IndexerJob<'a> {
    client: &'a VideoIndexerClient,
    video_id: String,
}

#[async_trait]
impl RemoteJob for IndexerJob<'_> {
    type Output = VideoIndex;

    fn id(&self) -> &str {
        &self.video_id
    }

    async fn check(&self) -> Result<JobSnapshot<VideoIndex>> {
        let token = self.client.access_token().await?;

        let response = self
            .client
            .http
            .get(
                self.client
                    .account_url(&format!("Videos/{}/Index", self.video_id)),
            )
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        let index: VideoIndex = read_json(response).await?;

        let state = JobState::from_remote(index.state.as_deref().unwrap_or("Unknown"));
        Ok(match state {
            JobState::Processed => JobSnapshot::processed(index),
            JobState::Failed => JobSnapshot {
                state,
                payload: None,
                error_message: index.error_message,
            },
            other => JobSnapshot::pending(other),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VideoIndex {
    state: Option<String>,
    error_message: Option<String>,
    videos: Vec<IndexedVideo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndexedVideo {
    insights: Insights,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Insights {
    faces: Vec<Detection>,
    observed_people: Vec<Detection>,
    shots: Vec<IndexShot>,
    labels: Vec<IndexLabel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Detection {
    confidence: f64,
    instances: Vec<Instance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Instance {
    confidence: Option<f64>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndexShot {
    instances: Vec<Instance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndexLabel {
    name: String,
    instances: Vec<Instance>,
}

impl VideoIndex {
    fn into_insights(self) -> VideoInsights {
        let mut faces = Vec::new();
        let mut persons = Vec::new();
        let mut shots = Vec::new();
        let mut labels = Vec::new();

        for video in self.videos {
            let insights = video.insights;
            faces.extend(insights.faces.iter().map(track));
            persons.extend(insights.observed_people.iter().map(track));
            shots.extend(
                insights
                    .shots
                    .iter()
                    .flat_map(|shot| shot.instances.iter())
                    .map(|instance| Shot {
                        start_time: parse_timecode(instance.start.as_deref()),
                        end_time: parse_timecode(instance.end.as_deref()),
                    }),
            );
            for label in &insights.labels {
                labels.extend(label.instances.iter().map(|instance| Label {
                    description: label.name.clone(),
                    confidence: instance.confidence.unwrap_or_default(),
                    start_time: parse_timecode(instance.start.as_deref()),
                    end_time: parse_timecode(instance.end.as_deref()),
                }));
            }
        }

        VideoInsights::new(faces, persons, shots, labels)
    }
}

fn track(detection: &Detection) -> Track {
    Track {
        confidence: detection.confidence,
        timestamps: detection
            .instances
            .iter()
            .map(|instance| TrackTimestamp {
                time: parse_timecode(instance.start.as_deref()),
                confidence: instance.confidence.unwrap_or(detection.confidence),
            })
            .collect(),
    }
}

/// Parse an `H:MM:SS.fff` timecode into seconds; absent or malformed → 0.
fn parse_timecode(timecode: Option<&str>) -> f64 {
    let Some(raw) = timecode else {
        return 0.0;
    };
    raw.trim()
        .split(':')
        .try_fold(0.0, |acc, part| part.parse::<f64>().map(|v| acc * 60.0 + v))
        .unwrap_or(0.0)
}
