use assess_flow::FlowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{error, warn};

/// Error type returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected before any provider was contacted.
    #[error("{0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Flow(#[from] FlowError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Flow(flow) => match flow {
                FlowError::NotConfigured(_) => (StatusCode::BAD_REQUEST, "NOT_CONFIGURED"),
                FlowError::Media(_) => (StatusCode::BAD_REQUEST, "INVALID_MEDIA"),
                FlowError::TimedOut { .. } => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
                FlowError::JobFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "JOB_FAILED"),
                FlowError::TokenAcquisition(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_ERROR")
                }
                FlowError::Provider { .. } | FlowError::Transport(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = self.to_string();

        if status.is_server_error() {
            error!(code, error = %message, "Request failed");
        } else {
            warn!(code, error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
