use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Pages backed by backend calls made with the user's token. Each handler takes a
/// `SessionToken`, which rejects with 401 if the gate was configured to let an anonymous
/// request through.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /?category=...
        // Home feed: user, posts, categories.
        .route("/", get(handlers::feed))
        // GET /categories
        .route("/categories", get(handlers::list_categories))
        // POST /posts
        .route("/posts", post(handlers::create_post))
        // GET/PUT /profile
        // Protected: anonymous visitors are redirected to login.
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // POST /profile/photo
        // Multipart image upload, forwarded to the backend.
        .route("/profile/photo", post(handlers::upload_photo))
}
