use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{error::AppError, repository::RepositoryState, session::SessionUserId};

/// Where unauthenticated visitors of protected routes are sent.
pub const LOGIN_PATH: &str = "/user/login";

/// AuthContext
///
/// The per-request authentication state. [`authenticate`] computes it once and
/// stores it in the request extensions; handlers, templates and
/// [`require_authentication`] only read it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext {
    /// Set only when the session names a user that still exists.
    pub user_id: Option<Uuid>,
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// AuthContext Extractor Implementation
///
/// Never rejects: a request that did not pass through [`authenticate`] is
/// simply anonymous.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .unwrap_or_default())
    }
}

/// authenticate
///
/// Resolves the session's user id into an [`AuthContext`].
///
/// A user id whose account no longer exists demotes the request to anonymous
/// and the request continues. A failure of the existence lookup itself is not
/// treated as "anonymous": it is escalated as a server error.
pub async fn authenticate(
    State(repo): State<RepositoryState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut ctx = AuthContext::default();

    if let Some(user_id) = SessionUserId::get(&session).await? {
        if repo.user_exists(user_id).await? {
            ctx.user_id = Some(user_id);
        } else {
            tracing::debug!(%user_id, "session refers to a user that no longer exists");
        }
    }

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// require_authentication
///
/// Gate for protected routes. Anonymous requests are redirected to the login
/// page without reaching the handler; authenticated responses are marked
/// `Cache-Control: no-store`.
pub async fn require_authentication(ctx: AuthContext, request: Request, next: Next) -> Response {
    if !ctx.is_authenticated() {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
