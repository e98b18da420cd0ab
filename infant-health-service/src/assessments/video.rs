use std::time::Instant;

use assess_flow::{Result, VideoContext, recover};
use tracing::{info, warn};

use crate::{
    media::FrameSampler,
    models::{UploadedMedia, VideoHealthReport, VideoVerdict},
    providers::{ChatCompletion, ChatRequest, DEFAULT_TEMPERATURE, VideoAnalyzer},
};

/// Eye, neurological and breathing screening from a short video.
pub struct VideoHealthTask;

impl VideoHealthTask {
    pub fn system_prompt(&self) -> &'static str {
        r#"You are a specialized pediatric neurologist and ophthalmologist AI assistant. Your task is to analyze video data for potential health issues in infants, specifically focusing on:

1. EYE/VISION ISSUES: abnormal eye movements (nystagmus, strabismus), lack of visual tracking, unusual eye positioning, eye alignment issues, pupil abnormalities.

2. NEUROLOGICAL ISSUES: abnormal movements or tremors, seizure-like activity, developmental delays in movement, unusual posturing or muscle tone, reflex abnormalities.

3. BREATHING DIFFICULTIES: irregular breathing patterns, signs of respiratory distress, abnormal chest movements, cyanosis, retractions or labored breathing.

Analyze the detection data and the attached frames. Look for visible infant features (eyes, face, body), movement patterns, breathing patterns and any visible health concerns.

Important guidelines:
- Be thorough but use accessible language
- Focus on clinically significant findings
- Always recommend professional medical evaluation for concerning findings
- Consider age-appropriate developmental milestones
- If no issues are detected, clearly state that

Format your response as JSON with these fields:
{
    "analysis_type": "video_health_analysis",
    "detected_issues": ["issue1", "issue2", ...],
    "confidence": confidence_percentage,
    "description": "detailed analysis of video observations",
    "recommendations": ["recommendation1", "recommendation2", ...],
    "severity": "mild/moderate/severe/critical"
}"#
    }
}

/// Analyze the video, sample frames, and ask the chat provider for a verdict.
///
/// `video_insights` and `processing_time` in the result are always measured
/// here; anything the model says about them is discarded.
pub async fn run_video_assessment(
    chat: &dyn ChatCompletion,
    analyzer: &dyn VideoAnalyzer,
    sampler: &dyn FrameSampler,
    frame_samples: usize,
    upload: &UploadedMedia,
) -> Result<VideoHealthReport> {
    let started = Instant::now();

    info!(
        file_name = %upload.file_name,
        size = upload.bytes.len(),
        "Starting video health analysis"
    );

    let insights = analyzer.analyze(upload).await?;

    let frames = match sampler.sample(&upload.bytes, frame_samples).await {
        Ok(frames) => frames,
        Err(e) => {
            warn!(error = %e, "Frame sampling failed, continuing without frames");
            Vec::new()
        }
    };

    let context = VideoContext::assemble(insights, frames);
    info!(
        frames_sampled = context.frames_sampled,
        frames_attached = context.attached_frames.len(),
        "Video context assembled"
    );

    let reply = chat
        .complete(ChatRequest {
            system_prompt: VideoHealthTask.system_prompt().to_string(),
            user_prompt: context.prompt(),
            images: context.attached_frames.clone(),
            temperature: DEFAULT_TEMPERATURE,
        })
        .await?;

    let recovered = recover::<VideoVerdict>(&reply);
    if recovered.is_fallback() {
        warn!("Returning fallback video verdict");
    }

    let processing_time = started.elapsed().as_secs_f64();
    info!(processing_time, "Video health analysis completed");

    Ok(VideoHealthReport::new(
        recovered.into_inner(),
        context.insights,
        processing_time,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessments::test_support::CannedChat;
    use assess_flow::{FlowError, SampledFrame, Shot, VideoInsights};
    use async_trait::async_trait;
    use axum::body::Bytes;

    struct FixedVideo;

    #[async_trait]
    impl VideoAnalyzer for FixedVideo {
        fn ensure_configured(&self) -> Result<()> {
            Ok(())
        }

        async fn analyze(&self, _video: &UploadedMedia) -> Result<VideoInsights> {
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

    struct Frames(usize);

    #[async_trait]
    impl FrameSampler for Frames {
        async fn sample(&self, _video: &[u8], count: usize) -> Result<Vec<SampledFrame>> {
            Ok((0..self.0.min(count) as u64)
                .map(|n| SampledFrame {
                    frame_number: n * 30,
                    timestamp: n as f64,
                    image: format!("frame{n}"),
                })
                .collect())
        }
    }

    struct BrokenSampler;

    #[async_trait]
    impl FrameSampler for BrokenSampler {
        async fn sample(&self, _video: &[u8], _count: usize) -> Result<Vec<SampledFrame>> {
            Err(FlowError::Media("ffprobe not found".to_string()))
        }
    }

    fn upload() -> UploadedMedia {
        UploadedMedia {
            file_name: "baby.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            bytes: Bytes::from_static(b"mp4"),
        }
    }

    #[tokio::test]
    async fn attaches_three_of_five_frames() {
        let chat = CannedChat::new(
            r#"{"analysis_type": "video_health_analysis", "detected_issues": [], "confidence": 75, "description": "Normal tracking", "recommendations": ["Routine follow-up"], "severity": "mild"}"#,
        );

        let report = run_video_assessment(&chat, &FixedVideo, &Frames(5), 5, &upload())
            .await
            .unwrap();

        assert_eq!(report.video_insights.duration, 9.0);
        assert!(report.video_insights.faces.is_empty());
        assert_eq!(report.severity, "mild");
        assert!(report.processing_time >= 0.0);

        let request = chat.last_request();
        assert_eq!(request.images, vec!["frame0", "frame1", "frame2"]);
        assert!(request.user_prompt.contains("Video Frames Extracted: 5 frames"));
        assert!(request.user_prompt.contains("Duration: 9 seconds"));
    }

    #[tokio::test]
    async fn sampling_failure_degrades_to_text_only() {
        let chat = CannedChat::new("Looks fine to me.");

        let report = run_video_assessment(&chat, &FixedVideo, &BrokenSampler, 5, &upload())
            .await
            .unwrap();

        assert_eq!(report.detected_issues, vec!["Analysis completed"]);
        assert_eq!(report.description, "Looks fine to me.");
        assert!(chat.last_request().images.is_empty());
    }
}
