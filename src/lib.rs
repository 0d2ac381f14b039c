use std::any::Any;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, header},
    middleware,
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tower_sessions::SessionStore;
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod session;
pub mod templates;
pub mod validator;

// Routing segregated by middleware tier (public, dynamic, protected).
pub mod routes;
use routes::{dynamic, protected, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MockRepository, PostgresRepository, RepositoryState};
pub use templates::Templates;

/// Content-Security-Policy sent with every response.
const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com";

/// AppState
///
/// The dependency container built once at startup and cloned into every
/// request. Nothing in it is mutable; the repository and templates are shared
/// behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: snippets and user accounts.
    pub repo: RepositoryState,
    /// Compiled HTML templates.
    pub templates: Templates,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Templates {
    fn from_ref(app_state: &AppState) -> Templates {
        app_state.templates.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the full application: route tiers, their middleware chains, the
/// static file service and the standard outer layers.
///
/// Tier chains, outermost first:
/// - dynamic: session load/save -> CSRF check -> authentication flag
/// - protected: dynamic chain -> authentication enforcement
///
/// `/ping` and `/static/*` bypass both chains.
pub fn create_router<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = session::session_layer(session_store, state.config.session_lifetime);

    let protected_routes = protected::protected_routes()
        .route_layer(middleware::from_fn(auth::require_authentication));

    let session_routes = dynamic::dynamic_routes()
        .merge(protected_routes)
        .route_layer(
            ServiceBuilder::new()
                .layer(session_layer)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    csrf::csrf_protect,
                ))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::authenticate,
                )),
        );

    let static_files = ServeDir::new(&state.config.static_dir);

    let router = Router::new()
        .merge(public::public_routes())
        .merge(session_routes)
        .nest_service("/static", static_files)
        .with_state(state);

    apply_standard_layers(router)
}

/// apply_standard_layers
///
/// Wraps `router` in the layers every request passes through, outermost first:
/// the fixed security headers, panic recovery, then request id + tracing.
pub fn apply_standard_layers(router: Router) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    router.layer(
        ServiceBuilder::new()
            // Outside the panic boundary so the recovered 500 carries them too.
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("origin-when-cross-origin"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("deny"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_XSS_PROTECTION,
                HeaderValue::from_static("0"),
            ))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    error::panic_response(detail)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI, protocol version and the request id set
/// by `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        req_id = %request_id,
    )
}
