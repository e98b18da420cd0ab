use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::Serialize;
use tracing::warn;

const API_KEY_PLACEHOLDER: &str = "your-azure-openai-api-key-here";

/// Chat-completion provider settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub deployment: String,
    pub api_key: Option<String>,
    pub api_version: String,
}

impl OpenAiConfig {
    pub fn api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Synchronous video-intelligence provider settings.
#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub base_url: String,
    /// Budget for the long-running annotate operation.
    pub operation_timeout: Duration,
}

/// Legacy asynchronous video-indexer settings.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub key: Option<String>,
    pub location: String,
    pub account_id: Option<String>,
    pub base_url: String,
}

impl IndexerConfig {
    /// Trial accounts must trade the subscription key for a short-lived token.
    pub fn is_trial(&self) -> bool {
        self.location == "trial"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackend {
    Gcp,
    Indexer,
}

impl FromStr for VideoBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcp" => Ok(Self::Gcp),
            "indexer" => Ok(Self::Indexer),
            other => Err(anyhow!("unknown video backend '{}', expected gcp or indexer", other)),
        }
    }
}

/// Immutable service configuration, built once at startup.
///
/// | Env Var                          | Default                                        |
/// |----------------------------------|------------------------------------------------|
/// | `AZURE_OPENAI_ENDPOINT`          | `https://eastus.api.cognitive.microsoft.com/`  |
/// | `AZURE_OPENAI_MODEL`             | `gpt-4o`                                       |
/// | `AZURE_OPENAI_DEPLOYMENT`        | `gpt-4o`                                       |
/// | `AZURE_OPENAI_API_KEY`           | unset                                          |
/// | `AZURE_OPENAI_API_VERSION`       | `2024-12-01-preview`                           |
/// | `VIDEO_BACKEND`                  | `gcp`                                          |
/// | `GCP_PROJECT_ID`                 | unset                                          |
/// | `GCP_ACCESS_TOKEN`               | unset                                          |
/// | `GCP_VIDEO_INTELLIGENCE_URL`     | `https://videointelligence.googleapis.com`     |
/// | `AZURE_VIDEO_INDEXER_KEY`        | unset                                          |
/// | `AZURE_VIDEO_INDEXER_LOCATION`   | `trial`                                        |
/// | `AZURE_VIDEO_INDEXER_ACCOUNT_ID` | unset                                          |
/// | `AZURE_VIDEO_INDEXER_URL`        | `https://api.videoindexer.ai`                  |
/// | `VIDEO_POLL_INTERVAL_SECS`       | `5`                                            |
/// | `VIDEO_POLL_TIMEOUT_SECS`        | `300`                                          |
/// | `VIDEO_FRAME_SAMPLES`            | `5`                                            |
/// | `MAX_UPLOAD_BYTES`               | `209715200`                                    |
/// | `HOST` / `PORT` / `DEBUG`        | `0.0.0.0` / `8000` / `false`                   |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub openai: OpenAiConfig,
    pub video_backend: VideoBackend,
    pub gcp: GcpConfig,
    pub indexer: IndexerConfig,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub frame_samples: usize,
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = secret("AZURE_OPENAI_API_KEY").filter(|key| key != API_KEY_PLACEHOLDER);

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 8000)?,
            debug: text("DEBUG", "false").eq_ignore_ascii_case("true"),
            openai: OpenAiConfig {
                endpoint: text(
                    "AZURE_OPENAI_ENDPOINT",
                    "https://eastus.api.cognitive.microsoft.com/",
                ),
                model: text("AZURE_OPENAI_MODEL", "gpt-4o"),
                deployment: text("AZURE_OPENAI_DEPLOYMENT", "gpt-4o"),
                api_key,
                api_version: text("AZURE_OPENAI_API_VERSION", "2024-12-01-preview"),
            },
            video_backend: parse(&lookup, "VIDEO_BACKEND", VideoBackend::Gcp)?,
            gcp: GcpConfig {
                project_id: secret("GCP_PROJECT_ID"),
                access_token: secret("GCP_ACCESS_TOKEN"),
                base_url: text(
                    "GCP_VIDEO_INTELLIGENCE_URL",
                    "https://videointelligence.googleapis.com",
                ),
                operation_timeout: Duration::from_secs(600),
            },
            indexer: IndexerConfig {
                key: secret("AZURE_VIDEO_INDEXER_KEY"),
                location: text("AZURE_VIDEO_INDEXER_LOCATION", "trial"),
                account_id: secret("AZURE_VIDEO_INDEXER_ACCOUNT_ID"),
                base_url: text("AZURE_VIDEO_INDEXER_URL", "https://api.videoindexer.ai"),
            },
            poll_interval: Duration::from_secs(parse(&lookup, "VIDEO_POLL_INTERVAL_SECS", 5)?),
            poll_timeout: Duration::from_secs(parse(&lookup, "VIDEO_POLL_TIMEOUT_SECS", 300)?),
            frame_samples: parse(&lookup, "VIDEO_FRAME_SAMPLES", 5)?,
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", 200 * 1024 * 1024)?,
        })
    }

    /// Missing secrets only disable the endpoints that need them.
    pub fn warn_missing_secrets(&self) {
        if !self.openai.api_key_configured() {
            warn!("AZURE_OPENAI_API_KEY not set or using placeholder value; image and video assessments are unavailable");
        }
        match self.video_backend {
            VideoBackend::Gcp if self.gcp.project_id.is_none() => {
                warn!("GCP_PROJECT_ID not set; video analysis is unavailable");
            }
            VideoBackend::Indexer if self.indexer.key.is_none() => {
                warn!("AZURE_VIDEO_INDEXER_KEY not set; video analysis is unavailable");
            }
            _ => {}
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<ServiceConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.openai.deployment, "gpt-4o");
        assert_eq!(config.video_backend, VideoBackend::Gcp);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Duration::from_secs(300));
        assert!(config.indexer.is_trial());
        assert!(!config.openai.api_key_configured());
    }

    #[test]
    fn placeholder_api_key_counts_as_missing() {
        let config = config_from(&[("AZURE_OPENAI_API_KEY", API_KEY_PLACEHOLDER)]).unwrap();
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "9100"),
            ("DEBUG", "True"),
            ("VIDEO_BACKEND", "Indexer"),
            ("AZURE_VIDEO_INDEXER_LOCATION", "westeurope"),
            ("VIDEO_POLL_TIMEOUT_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert!(config.debug);
        assert_eq!(config.video_backend, VideoBackend::Indexer);
        assert!(!config.indexer.is_trial());
        assert_eq!(config.poll_timeout, Duration::from_secs(60));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
