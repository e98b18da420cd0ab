use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to remote assessment providers.
///
/// A reply that cannot be parsed into a result schema is *not* an error; see
/// [`crate::recovery`].
#[derive(Debug, Error)]
pub enum FlowError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The remote job reached its `Failed` state.
    #[error("Video processing failed: {0}")]
    JobFailed(String),

    #[error("Job {job_id} did not finish within {}s", .waited.as_secs())]
    TimedOut { job_id: String, waited: Duration },

    #[error("Failed to acquire access token: {0}")]
    TokenAcquisition(String),

    /// A credential or endpoint required by the call is missing.
    #[error("{0}")]
    NotConfigured(String),

    /// Uploaded media could not be decoded or re-encoded.
    #[error("Media error: {0}")]
    Media(String),
}

impl FlowError {
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
