use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Protected Router Module
///
/// Routes that only make sense for a logged-in user. On top of the dynamic
/// tier, `require_authentication` redirects anonymous requests to the login
/// page before any handler here runs.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /snippet/create
        .route(
            "/snippet/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        // POST /user/logout
        .route("/user/logout", post(handlers::user_logout_post))
}
