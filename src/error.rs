use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No matching testbed, container or registry entry
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one port registry document, a held port, or a terminal testbed
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("container runtime operation failed: {0}")]
    RuntimeOperationFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RuntimeOperationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceFailed(_) | Self::Config(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<bollard::errors::Error> for ProvisionError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::NotFound(message),
            other => Self::RuntimeOperationFailed(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for ProvisionError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::PersistenceFailed(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for ProvisionError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::PersistenceFailed(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for ProvisionError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::PersistenceFailed(err.to_string())
    }
}
