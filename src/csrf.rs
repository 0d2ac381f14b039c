use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{Method, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::convert::Infallible;
use tower_sessions::Session;

use crate::{
    config::AppConfig,
    error::AppError,
    session::{SessionCsrf, SessionDeadline},
};

/// Largest form body the CSRF check is willing to buffer.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// CsrfToken
///
/// The current session's token, placed in request extensions by [`csrf_protect`]
/// so pages can embed it in their forms.
#[derive(Debug, Clone, Default)]
pub struct CsrfToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CsrfToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CsrfToken>().cloned().unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct CsrfField {
    csrf_token: String,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// csrf_protect
///
/// Pins the session to its absolute deadline, ensures it holds a CSRF token
/// and, for state-changing requests, that the submitted `csrf_token` form field
/// equals it. A missing or wrong token rejects the request with 400 before the
/// handler runs. The buffered
/// body is handed on unchanged so the handler can still extract the form.
pub async fn csrf_protect(
    State(config): State<AppConfig>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    SessionDeadline::apply(&session, config.session_lifetime).await?;
    let token = SessionCsrf::get_or_create(&session).await?;

    let mut request = if is_state_changing(request.method()) {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| AppError::CsrfRejected)?;

        let submitted = serde_html_form::from_bytes::<CsrfField>(&bytes)
            .ok()
            .map(|field| field.csrf_token);

        if submitted.as_deref() != Some(token.as_str()) {
            tracing::warn!(method = %parts.method, uri = %parts.uri, "rejected request with bad CSRF token");
            return Err(AppError::CsrfRejected);
        }

        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    request.extensions_mut().insert(CsrfToken(token));
    Ok(next.run(request).await)
}
