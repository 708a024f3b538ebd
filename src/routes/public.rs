use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no backend session. The login and registration pages are still
/// gated: a signed-in user is sent home instead.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe, exempt from the gate.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /auth/login
        .route(
            "/auth/login",
            get(handlers::login_page).post(handlers::login),
        )
        // GET/POST /auth/register
        .route(
            "/auth/register",
            get(handlers::register_page).post(handlers::register),
        )
        // POST /auth/logout
        .route("/auth/logout", post(handlers::logout))
        // GET/POST /theme
        // Light/dark preference, stored in its own cookie.
        .route("/theme", get(handlers::get_theme).post(handlers::set_theme))
}
