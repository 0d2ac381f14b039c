//! Error types for the request pipeline.
//!
//! Handlers and middleware return [`AppError`]; its `IntoResponse` impl decides
//! what the client sees. Anything that is not the client's fault is logged in
//! full and answered with the same generic 500 page.

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("resource not found")]
    NotFound,
    #[error("CSRF token missing or mismatched")]
    CsrfRejected,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("template error: {0:#}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound | Self::Repository(RepositoryError::NoRecord) => {
                (StatusCode::NOT_FOUND, status_text(StatusCode::NOT_FOUND)).into_response()
            }
            Self::CsrfRejected => {
                tracing::debug!("{}", self);
                (StatusCode::BAD_REQUEST, status_text(StatusCode::BAD_REQUEST)).into_response()
            }
            err => InternalServerError(err).into_response(),
        }
    }
}

/// Wrapper type for converting any displayable error into a 500 response.
///
/// The full error goes to the log; the client only gets the canned status text.
pub struct InternalServerError<E>(pub E);

impl<E: std::fmt::Display> IntoResponse for InternalServerError<E> {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            status_text(StatusCode::INTERNAL_SERVER_ERROR),
        )
            .into_response()
    }
}

/// Response body used for panics caught at the outermost layer.
///
/// Asks the server to drop the connection, since the handler state that
/// panicked may have left the request half-read.
pub fn panic_response(detail: &str) -> Response {
    tracing::error!(panic = %detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONNECTION, "close")],
        status_text(StatusCode::INTERNAL_SERVER_ERROR),
    )
        .into_response()
}

fn status_text(status: StatusCode) -> Html<String> {
    Html(status.canonical_reason().unwrap_or("Error").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_record_maps_to_not_found() {
        let resp = AppError::from(RepositoryError::NoRecord).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn csrf_rejection_is_a_client_error() {
        let resp = AppError::CsrfRejected.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_are_generic_500s() {
        let resp = AppError::from(RepositoryError::Task("pool timed out".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_response_closes_connection() {
        let resp = panic_response("boom");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[header::CONNECTION], "close");
    }
}
