use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Dynamic Router Module
///
/// Pages open to anonymous visitors. The session, CSRF and authentication-flag
/// layers run in front of every route here, so handlers can render the nav bar
/// state, flash messages and form tokens.
pub fn dynamic_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Home page listing the latest snippets. Matches the root path only.
        .route("/", get(handlers::home))
        // GET /snippet/view/{id}
        // A single snippet; unknown, expired and malformed ids all 404.
        .route("/snippet/view/{id}", get(handlers::snippet_view))
        // GET/POST /user/signup
        .route(
            "/user/signup",
            get(handlers::user_signup).post(handlers::user_signup_post),
        )
        // GET/POST /user/login
        // A successful POST rotates the session id before storing the user.
        .route(
            "/user/login",
            get(handlers::user_login).post(handlers::user_login_post),
        )
}
