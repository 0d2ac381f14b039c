use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints outside the session machinery. They never read or write a session
/// cookie and are not subject to CSRF checks.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /ping
        // Liveness probe for load balancers; always answers "OK".
        .route("/ping", get(handlers::ping))
}
