use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use tower_cookies::CookieManagerLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access control: the route gate, the token verifiers and the session store it reads.
pub mod auth;
pub mod gate;
pub mod session;

// Pages, their models and form checks.
pub mod error;
pub mod handlers;
pub mod models;
pub mod validation;

// The external backend and configuration.
pub mod backend;
pub mod config;

// Route groups (auth pages and session-backed pages).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use backend::{BackendApi, BackendError, BackendState, HttpBackend, MockBackend};
pub use config::AppConfig;
pub use gate::{AccessGate, GateOutcome, RouteTable};
pub use session::{CookieSession, MemorySession, SessionStore};

/// ApiDoc
///
/// OpenAPI document for the portal's pages, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::register_page, handlers::register,
        handlers::logout, handlers::feed, handlers::list_categories, handlers::create_post,
        handlers::get_profile, handlers::update_profile, handlers::upload_photo,
        handlers::get_theme, handlers::set_theme
    ),
    components(
        schemas(
            models::User, models::Gender, models::Category, models::PostAuthor, models::Post,
            models::LoginForm, models::RegisterForm, models::UpdateUserRequest,
            models::CreatePostRequest, models::ThemeRequest, models::Theme,
            models::ThemeResponse, models::LoginPage, models::RegisterPage, models::FeedPage,
            models::ProfilePage, models::PhotoUploadResponse, models::ErrorResponse,
        )
    ),
    tags(
        (name = "overthink-portal", description = "Overthink web portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// Unified state shared by every request: the backend client, the access gate and the
/// loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Backend Layer: talks to the external API (HTTP in production, mock in tests).
    pub backend: BackendState,
    /// Route tables plus the configured token verifier.
    pub gate: AccessGate,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the gate from the configuration so the two never disagree.
    pub fn new(config: AppConfig, backend: BackendState) -> Self {
        Self {
            backend,
            gate: AccessGate::from_config(&config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for BackendState {
    fn from_ref(app_state: &AppState) -> BackendState {
        app_state.backend.clone()
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(app_state: &AppState) -> AccessGate {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, the access gate, the cookie jar and the observability stack.
///
/// The gate is a router-wide layer rather than a `route_layer`, so paths with no handler
/// are gated too (an anonymous `/settings` goes to the login page, not a 404).
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .with_state(state.clone());

    // 3. Access Gate, inside the cookie layer so it can read the jar.
    let gated_router = base_router
        .layer(middleware::from_fn_with_state(state, gate::access_gate))
        .layer(CookieManagerLayer::new());

    // 4. Observability and Correlation Layers
    gated_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`, tagged with the `x-request-id` so every log line of one request
/// correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
