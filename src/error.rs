//! Error taxonomy for the news pipeline and the HTTP mapping used by the router.
//!
//! Each pipeline stage owns its own error type; the orchestrator decides which of them
//! are terminal for a request. `ApiError` is the only type that knows about status codes.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::store::StoreError;

/// No (or invalid) authenticated principal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Login required")]
    LoginRequired,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Email already exists")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid filter service token")]
    ServiceToken,
}

/// Something the caller asked for does not exist. Expected, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("User not found")]
    Profile,
    #[error("No processed files found")]
    Processed,
    #[error("No raw news files found")]
    Raw,
}

/// Upstream provider unreachable, non-2xx, or returned a body we cannot read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Object store write failure.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("object store write failed: {0}")]
    Store(#[from] StoreError),
    #[error("encoding snapshot failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("object store write timed out after {0:?}")]
    Timeout(Duration),
}

/// Reading a stored snapshot back failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("object store read failed: {0}")]
    Store(#[from] StoreError),
    #[error("stored snapshot is not a JSON item array: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("object store read timed out after {0:?}")]
    Timeout(Duration),
}

/// The remote filter collaborator could not produce a filtered list.
/// Never surfaced to callers; it only selects the unfiltered fallback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteFilterError {
    #[error("remote filter unreachable: {0}")]
    Unreachable(String),
    #[error("remote filter timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote filter returned status {code}: {detail}")]
    Status { code: u16, detail: String },
    #[error("remote filter response malformed: {0}")]
    Malformed(String),
}

/// Terminal failures of one personalized-feed run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("raw snapshot upload failed: {0}")]
    Publish(#[from] PublishError),
}

/// HTTP-facing error: a status plus the public message rendered as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = match e {
            AuthError::MissingCredentials | AuthError::EmailTaken => StatusCode::BAD_REQUEST,
            AuthError::LoginRequired
            | AuthError::NotLoggedIn
            | AuthError::InvalidCredentials
            | AuthError::ServiceToken => StatusCode::UNAUTHORIZED,
        };
        Self::new(status, e.to_string())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(e: NotFoundError) -> Self {
        Self::new(StatusCode::NOT_FOUND, e.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Fetch(f) => f.into(),
            PipelineError::Publish(p) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Upload failed: {p}"),
            ),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NotFound(nf) => nf.into(),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_client_statuses() {
        assert_eq!(
            ApiError::from(AuthError::LoginRequired).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::EmailTaken).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(NotFoundError::Profile),
            ApiError::new(StatusCode::NOT_FOUND, "User not found")
        );
    }

    #[test]
    fn pipeline_errors_are_server_errors() {
        let fetch: ApiError = PipelineError::Fetch(FetchError::new("boom")).into();
        assert_eq!(fetch.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fetch.message, "boom");

        let publish: ApiError =
            PipelineError::Publish(PublishError::Timeout(Duration::from_secs(1))).into();
        assert_eq!(publish.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(publish.message.starts_with("Upload failed"));
    }
}
