use assess_flow::{
    VideoInsights,
    recovery::{
        FALLBACK_CONFIDENCE, FALLBACK_MARKER, FALLBACK_SEVERITY, Recoverable, blank_if_missing,
    },
};
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The two kinds of media the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn mime_prefix(self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Video => "video/",
        }
    }

    pub fn rejection(self) -> &'static str {
        match self {
            MediaKind::Image => "File must be an image",
            MediaKind::Video => "File must be a video",
        }
    }
}

/// An uploaded file. Lives for one request only.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinAssessment {
    pub condition: String,
    pub confidence: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub severity: String,
}

impl Recoverable for SkinAssessment {
    fn fallback(raw_reply: &str) -> Self {
        Self {
            condition: FALLBACK_MARKER.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            description: raw_reply.to_string(),
            recommendations: vec![
                "Please consult a pediatrician for professional assessment".to_string(),
            ],
            severity: FALLBACK_SEVERITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialDysmorphologyReport {
    pub genetic_condition: String,
    pub confidence: f64,
    pub facial_features: Vec<String>,
    pub description: String,
    pub recommendations: Vec<String>,
    pub urgency_level: String,
    pub risk_factors: Vec<String>,
}

impl Recoverable for FacialDysmorphologyReport {
    fn fallback(raw_reply: &str) -> Self {
        Self {
            genetic_condition: FALLBACK_MARKER.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            facial_features: vec!["Analysis performed".to_string()],
            description: raw_reply.to_string(),
            recommendations: vec![
                "Please consult a geneticist for professional evaluation".to_string(),
            ],
            urgency_level: FALLBACK_SEVERITY.to_string(),
            risk_factors: vec!["Professional evaluation recommended".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureReport {
    pub posture_condition: String,
    pub confidence: f64,
    pub abnormalities: Vec<String>,
    pub description: String,
    pub recommendations: Vec<String>,
    pub severity: String,
    pub risk_factors: Vec<String>,
    pub body_regions: Vec<String>,
}

impl Recoverable for PostureReport {
    fn fallback(raw_reply: &str) -> Self {
        Self {
            posture_condition: FALLBACK_MARKER.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            abnormalities: vec!["Analysis performed".to_string()],
            description: raw_reply.to_string(),
            recommendations: vec![
                "Please consult an orthopedic specialist for professional evaluation".to_string(),
            ],
            severity: FALLBACK_SEVERITY.to_string(),
            risk_factors: vec!["Professional evaluation recommended".to_string()],
            body_regions: vec!["General assessment".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub device_type: String,
    pub extracted_values: Map<String, Value>,
    pub confidence: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub reading_quality: String,
    pub units: Map<String, Value>,
    pub timestamp: String,
    pub is_normal_range: bool,
    pub alert_level: String,
}

impl Recoverable for DeviceReading {
    fn fallback(raw_reply: &str) -> Self {
        let mut extracted_values = Map::new();
        extracted_values.insert(
            "error".to_string(),
            Value::String("Could not extract readings".to_string()),
        );

        Self {
            device_type: FALLBACK_MARKER.to_string(),
            extracted_values,
            confidence: FALLBACK_CONFIDENCE,
            description: raw_reply.to_string(),
            recommendations: vec![
                "Please ensure the device display is clearly visible in the photo".to_string(),
            ],
            reading_quality: "error".to_string(),
            units: Map::new(),
            timestamp: String::new(),
            is_normal_range: false,
            alert_level: FALLBACK_SEVERITY.to_string(),
        }
    }

    fn normalize(fields: &mut Map<String, Value>) {
        blank_if_missing(fields, "timestamp");
    }
}

/// The narrative part of a video verdict, as produced by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoVerdict {
    pub analysis_type: String,
    pub detected_issues: Vec<String>,
    pub confidence: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub severity: String,
}

impl Recoverable for VideoVerdict {
    fn fallback(raw_reply: &str) -> Self {
        Self {
            analysis_type: "video_health_analysis".to_string(),
            detected_issues: vec![FALLBACK_MARKER.to_string()],
            confidence: FALLBACK_CONFIDENCE,
            description: raw_reply.to_string(),
            recommendations: vec![
                "Please consult a pediatrician for professional evaluation".to_string(),
            ],
            severity: FALLBACK_SEVERITY.to_string(),
        }
    }
}

/// Video verdict plus the measurements the service made itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoHealthReport {
    pub analysis_type: String,
    pub detected_issues: Vec<String>,
    pub confidence: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub severity: String,
    pub video_insights: VideoInsights,
    /// Seconds from request start to verdict.
    pub processing_time: f64,
}

impl VideoHealthReport {
    pub fn new(verdict: VideoVerdict, video_insights: VideoInsights, processing_time: f64) -> Self {
        Self {
            analysis_type: verdict.analysis_type,
            detected_issues: verdict.detected_issues,
            confidence: verdict.confidence,
            description: verdict.description,
            recommendations: verdict.recommendations,
            severity: verdict.severity,
            video_insights,
            processing_time,
        }
    }
}
