use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookgen_core::storage::StorageError;
use bookgen_core::PipelineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Invalid download path: {0}")]
    InvalidPath(String),

    #[error("File not found")]
    FileNotFound,

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::FileNotFound,
            StorageError::InvalidKey(path) => Self::InvalidPath(path),
            other => Self::Storage(other),
        }
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(PipelineError::InvalidTitle) | Self::InvalidPath(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::FileNotFound => StatusCode::NOT_FOUND,
            Self::Pipeline(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
