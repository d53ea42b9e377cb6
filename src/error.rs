//! Errors surfaced by request handlers

use crate::auth::SessionError;
use crate::authz::Rejection;
use crate::storage::DirectoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// An authorization check turned the request away
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Body could not be decoded
    #[error("{0}")]
    Malformed(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Old password is incorrect")]
    WrongPassword,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<serde_json::Error> for PortalError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(rejection) => rejection.into_response(),
            Self::Malformed(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::InvalidCredentials | Self::WrongPassword => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::Directory(DirectoryError::NotFound(msg) | DirectoryError::Conflict(msg)) => {
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            Self::Directory(_) | Self::Session(_) => {
                error!(error = %self, "Portal internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
