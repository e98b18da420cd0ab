use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifecycle of a job owned by a remote service, as last observed by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Uploaded,
    Processing,
    /// Terminal success; the snapshot carries the result payload.
    Processed,
    /// Terminal error; the snapshot carries the job's own error message.
    Failed,
    /// Any state string the poller does not recognise. Treated as "keep waiting".
    Unknown(String),
}

impl JobState {
    pub fn from_remote(state: &str) -> Self {
        match state {
            "Uploaded" => Self::Uploaded,
            "Processing" => Self::Processing,
            "Processed" => Self::Processed,
            "Failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploaded => f.write_str("Uploaded"),
            Self::Processing => f.write_str("Processing"),
            Self::Processed => f.write_str("Processed"),
            Self::Failed => f.write_str("Failed"),
            Self::Unknown(raw) => write!(f, "Unknown({})", raw),
        }
    }
}

/// One observation of a remote job.
#[derive(Debug, Clone)]
pub struct JobSnapshot<T> {
    pub state: JobState,
    /// Present once the job is `Processed`.
    pub payload: Option<T>,
    /// Set by the remote service when the job is `Failed`.
    pub error_message: Option<String>,
}

impl<T> JobSnapshot<T> {
    pub fn pending(state: JobState) -> Self {
        Self {
            state,
            payload: None,
            error_message: None,
        }
    }

    pub fn processed(payload: T) -> Self {
        Self {
            state: JobState::Processed,
            payload: Some(payload),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            payload: None,
            error_message: Some(message.into()),
        }
    }
}

/// A job whose progress can only be learned by asking the remote service.
#[async_trait]
pub trait RemoteJob: Send + Sync {
    type Output: Send;

    /// Identifier assigned by the remote service.
    fn id(&self) -> &str;

    /// Fetch the current state. Every call is a network round trip.
    async fn check(&self) -> Result<JobSnapshot<Self::Output>>;
}
