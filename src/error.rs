use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    backend::BackendError,
    models::{ErrorResponse, FieldErrors},
};

/// PageError
///
/// Everything a page handler can fail with, mapped to a status and a user-facing message.
/// Backend failures keep the backend's own message when it sent one, otherwise the page's
/// `fallback` text is shown.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("form validation failed")]
    Validation(FieldErrors),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session rejected by backend")]
    SessionExpired,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{fallback}: {source}")]
    Backend {
        #[source]
        source: BackendError,
        fallback: &'static str,
    },
}

impl PageError {
    /// Wraps a backend failure; a rejected session becomes `SessionExpired` regardless of
    /// the page.
    pub fn backend(source: BackendError, fallback: &'static str) -> Self {
        match source {
            BackendError::Unauthorized => PageError::SessionExpired,
            source => PageError::Backend { source, fallback },
        }
    }

    /// Closure form for `map_err`.
    pub fn with_fallback(fallback: &'static str) -> impl Fn(BackendError) -> PageError {
        move |source| PageError::backend(source, fallback)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            PageError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    message: "Please correct the highlighted fields.".to_string(),
                    errors,
                },
            ),
            PageError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    message: "Could not sign in. Please check your details.".to_string(),
                    ..Default::default()
                },
            ),
            PageError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    message: "Your session has expired. Please sign in again.".to_string(),
                    ..Default::default()
                },
            ),
            PageError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message,
                    ..Default::default()
                },
            ),
            PageError::Backend { source, fallback } => {
                tracing::warn!(error = %source, "backend call failed");
                let message = match source {
                    BackendError::Status { message, .. } if !message.trim().is_empty() => message,
                    _ => fallback.to_string(),
                };
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse {
                        message,
                        ..Default::default()
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
