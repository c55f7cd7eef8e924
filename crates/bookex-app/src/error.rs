use axum::{
    extract::multipart::MultipartError,
    response::{IntoResponse, Response},
    Json,
};
use bookex_store::error::StoreError;
use http::StatusCode;
use tracing::error;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    DatabaseError(#[source] bookex_dal::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Session error: {0}")]
    SessionError(#[from] tower_sessions::session::Error),

    #[error("Multipart error: {0}")]
    MultipartError(#[from] MultipartError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<bookex_dal::Error> for ApiError {
    fn from(error: bookex_dal::Error) -> Self {
        match error {
            bookex_dal::Error::RecordNotFound(entity) => ApiError::ResourceNotFound(entity),
            bookex_dal::Error::AlreadyExists(entity) => ApiError::AlreadyExists(entity),
            other => ApiError::DatabaseError(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::StoreError(StoreError::InvalidPath) => StatusCode::BAD_REQUEST,
            ApiError::MultipartError(e) => e.status(),
            ApiError::DatabaseError(_)
            | ApiError::StoreError(_)
            | ApiError::SessionError(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ResourceNotFound(_) => "NOT_FOUND",
            ApiError::MultipartError(_) => "INVALID_REQUEST",
            ApiError::AlreadyExists(_) => "CONFLICT",
            ApiError::StoreError(StoreError::InvalidPath) => "INVALID_REQUEST",
            ApiError::DatabaseError(_)
            | ApiError::StoreError(_)
            | ApiError::SessionError(_)
            | ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
