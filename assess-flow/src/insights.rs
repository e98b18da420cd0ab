use serde::{Deserialize, Serialize};

/// Number of sampled frames attached to the chat-completion request.
pub const MAX_ATTACHED_FRAMES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTimestamp {
    pub time: f64,
    pub confidence: f64,
}

/// A face or person track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub confidence: f64,
    pub timestamps: Vec<TrackTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub description: String,
    pub confidence: f64,
    pub start_time: f64,
    pub end_time: f64,
}

/// Detections gathered from a video-intelligence provider.
///
/// `duration` is derived from the shot segments; providers are not trusted to
/// report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInsights {
    pub faces: Vec<Track>,
    pub persons: Vec<Track>,
    pub shots: Vec<Shot>,
    pub labels: Vec<Label>,
    pub duration: f64,
}

impl VideoInsights {
    pub fn new(
        faces: Vec<Track>,
        persons: Vec<Track>,
        shots: Vec<Shot>,
        labels: Vec<Label>,
    ) -> Self {
        let duration = shots.iter().map(|s| s.end_time).fold(0.0, f64::max);
        Self {
            faces,
            persons,
            shots,
            labels,
            duration,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "- Duration: {} seconds\n- Faces detected: {}\n- Persons detected: {}\n- Shot changes: {}\n- Labels detected: {}",
            self.duration,
            self.faces.len(),
            self.persons.len(),
            self.shots.len(),
            self.labels.len()
        )
    }
}

/// A still frame taken from the uploaded video, JPEG encoded as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledFrame {
    pub frame_number: u64,
    pub timestamp: f64,
    pub image: String,
}

/// Evenly spaced frame indices: `floor(total * i / count)` for `i in 0..count`.
pub fn frame_indices(total_frames: u64, count: usize) -> Vec<u64> {
    if total_frames == 0 || count == 0 {
        return Vec::new();
    }
    (0..count as u64)
        .map(|i| total_frames * i / count as u64)
        .collect()
}

/// Insights and frames merged into the multimodal context of the final verdict.
#[derive(Debug, Clone)]
pub struct VideoContext {
    pub insights: VideoInsights,
    pub frames_sampled: usize,
    /// At most [`MAX_ATTACHED_FRAMES`] base64 JPEG images.
    pub attached_frames: Vec<String>,
}

impl VideoContext {
    pub fn assemble(insights: VideoInsights, frames: Vec<SampledFrame>) -> Self {
        let frames_sampled = frames.len();
        let attached_frames = frames
            .into_iter()
            .take(MAX_ATTACHED_FRAMES)
            .map(|frame| frame.image)
            .collect();

        Self {
            insights,
            frames_sampled,
            attached_frames,
        }
    }

    /// Text part of the user message sent alongside the attached frames.
    pub fn prompt(&self) -> String {
        format!(
            "Please analyze this video data for potential health issues in an infant. \
             Focus on eye/vision issues, neurological issues, and breathing difficulties.\n\n\
             Video Analysis Data:\n{}\n\n\
             Video Frames Extracted: {} frames\n\n\
             Please provide a comprehensive health assessment based on this video data.",
            self.insights.summary(),
            self.frames_sampled
        )
    }
}
