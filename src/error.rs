use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

/// Failures talking to the backing store. Uniqueness violations never show up
/// here; the store turns them into [`CastError::AlreadyVoted`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum CastError {
    #[error("unknown poll option: {0}")]
    InvalidOption(String),

    #[error("voter has already voted")]
    AlreadyVoted,

    #[error("no usable voter identity")]
    EmptyIdentity,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// Wire-level reason attached to a rejected cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidOption,
    AlreadyVoted,
    EmptyIdentity,
    StorageUnavailable,
}

impl CastError {
    pub fn reason(&self) -> RejectReason {
        match self {
            CastError::InvalidOption(_) => RejectReason::InvalidOption,
            CastError::AlreadyVoted => RejectReason::AlreadyVoted,
            CastError::EmptyIdentity => RejectReason::EmptyIdentity,
            CastError::StorageUnavailable(_) => RejectReason::StorageUnavailable,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl From<sqlx::Error> for CastError {
    fn from(e: sqlx::Error) -> Self {
        CastError::StorageUnavailable(StorageError::Database(e))
    }
}

/// Failures of the HTTP layer that are not cast outcomes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Storage(e) => {
                error!("Request failed on storage: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
