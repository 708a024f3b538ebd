use crate::{
    AppState,
    auth::SessionToken,
    error::PageError,
    gate::is_local_path,
    models::{
        Category, CreatePostRequest, ErrorResponse, FeedPage, LoginForm, LoginPage, PhotoUpload,
        PhotoUploadResponse, Post, ProfilePage, RegisterForm, RegisterPage, SignInRequest,
        SignUpRequest, ThemeRequest, ThemeResponse, UpdateUserRequest, User,
    },
    session::{CookieSession, SessionStore, bearer},
    validation,
};
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde::Deserialize;
use std::collections::HashSet;

// --- Query Structs ---

/// LoginQuery
///
/// Query parameters the login page understands: the path remembered by the gate and the
/// flag set after a successful registration.
#[derive(Deserialize, utoipa::IntoParams, Default)]
pub struct LoginQuery {
    #[serde(rename = "redirectUrl")]
    pub redirect_url: Option<String>,
    pub registered: Option<bool>,
}

/// FeedFilter
#[derive(Deserialize, utoipa::IntoParams, Default)]
pub struct FeedFilter {
    /// Only show posts tagged with this category `refId`.
    pub category: Option<String>,
}

// --- Helpers ---

/// passport_number
///
/// Stable nine-digit hex "passport number" derived from the username. The hash walks the
/// UTF-16 code units with `h = c + ((h as i32) << 5) - h`, the same arithmetic the browser
/// client uses, so both sides print the same number.
pub fn passport_number(username: &str) -> String {
    let mut hash: i64 = 0;
    for unit in username.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = unit as i64 + (shifted - hash);
    }
    format!("{:0>9}", format!("{:X}", hash.unsigned_abs()))
}

/// post_login_target
///
/// Where to send the user after signing in: the remembered path when it is local,
/// otherwise home.
pub fn post_login_target(redirect_url: Option<&str>, home: &str) -> String {
    match redirect_url.map(str::trim) {
        Some(target) if is_local_path(target) => target.to_string(),
        _ => home.to_string(),
    }
}

// --- Auth Pages ---

/// login_page
///
/// [Gated: auth-only] Data for the login form.
#[utoipa::path(
    get,
    path = "/auth/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login page", body = LoginPage),
        (status = 307, description = "Already signed in, redirected home")
    )
)]
pub async fn login_page(session: CookieSession, Query(query): Query<LoginQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        redirect_url: query.redirect_url.filter(|target| is_local_path(target)),
        registered: query.registered.unwrap_or(false),
        theme: session.read_theme(),
    })
}

/// login
///
/// [Gated: auth-only] Validates the form, exchanges the credentials for a backend token,
/// stores it as `"Bearer <token>"` in the `token` cookie and redirects (303) to the
/// remembered path or home. "Remember me" keeps the cookie for 30 days.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginForm,
    responses(
        (status = 303, description = "Signed in"),
        (status = 401, description = "Wrong credentials", body = ErrorResponse),
        (status = 422, description = "Invalid form", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    session: CookieSession,
    Json(form): Json<LoginForm>,
) -> Result<Redirect, PageError> {
    validation::validate_login(&form).map_err(PageError::Validation)?;

    let raw_token = state
        .backend
        .sign_in(&SignInRequest::from(&form))
        .await
        .map_err(|e| match e {
            crate::backend::BackendError::Unauthorized => PageError::InvalidCredentials,
            other => PageError::backend(other, "Could not sign in. Please check your details."),
        })?;

    session.write_token(&bearer(&raw_token), form.remember_me);

    let target = post_login_target(form.redirect_url.as_deref(), &state.config.routes.home_path);
    tracing::info!(remember_me = form.remember_me, target = %target, "user signed in");

    Ok(Redirect::to(&target))
}

/// register_page
#[utoipa::path(
    get,
    path = "/auth/register",
    responses((status = 200, description = "Register page", body = RegisterPage))
)]
pub async fn register_page(session: CookieSession) -> Json<RegisterPage> {
    Json(RegisterPage {
        theme: session.read_theme(),
    })
}

/// register
///
/// [Gated: auth-only] Validates the form, creates the account on the backend and sends the
/// user to the login page with the `registered` banner. No session is created.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterForm,
    responses(
        (status = 303, description = "Registered"),
        (status = 422, description = "Invalid form", body = ErrorResponse),
        (status = 502, description = "Backend refused", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<Redirect, PageError> {
    validation::validate_register(&form).map_err(PageError::Validation)?;

    state
        .backend
        .sign_up(&SignUpRequest::from(&form))
        .await
        .map_err(PageError::with_fallback(
            "Could not create the account. Please check your details.",
        ))?;

    tracing::info!("account registered");
    Ok(Redirect::to(&format!(
        "{}?registered=true",
        state.config.routes.login_path
    )))
}

/// logout
///
/// Drops the token cookie and returns to the login page.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 303, description = "Signed out"))
)]
pub async fn logout(State(state): State<AppState>, session: CookieSession) -> Redirect {
    session.clear_token();
    tracing::info!("user signed out");
    Redirect::to(&state.config.routes.login_path)
}

// --- Feed ---

/// feed
///
/// [Gated: home] The home page: signed-in user, posts and categories, fetched
/// concurrently. `?category=` narrows the posts to one category. Anonymous posts lose
/// their author before leaving the server.
#[utoipa::path(
    get,
    path = "/",
    params(FeedFilter),
    responses(
        (status = 200, description = "Feed", body = FeedPage),
        (status = 401, description = "Session rejected", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    )
)]
pub async fn feed(
    State(state): State<AppState>,
    token: SessionToken,
    session: CookieSession,
    Query(filter): Query<FeedFilter>,
) -> Result<Json<FeedPage>, PageError> {
    let (user, posts, categories) = tokio::join!(
        state.backend.current_user(token.as_str()),
        state.backend.list_posts(token.as_str()),
        state.backend.list_categories(token.as_str()),
    );

    let user = user.map_err(PageError::with_fallback("Could not load your profile."))?;
    let posts = posts.map_err(PageError::with_fallback("Could not load posts."))?;
    let categories = categories.map_err(PageError::with_fallback("Could not load categories."))?;

    let selected_category = filter.category.filter(|c| !c.trim().is_empty());
    let posts = posts
        .into_iter()
        .filter(|post| {
            selected_category
                .as_deref()
                .is_none_or(|category| post.has_category(category))
        })
        .map(Post::redact_anonymous)
        .collect();

    Ok(Json(FeedPage {
        user,
        posts,
        categories,
        selected_category,
        theme: session.read_theme(),
    }))
}

/// list_categories
///
/// Categories for the post-creation popup.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Vec<Category>>, PageError> {
    let categories = state
        .backend
        .list_categories(token.as_str())
        .await
        .map_err(PageError::with_fallback("Could not load categories."))?;
    Ok(Json(categories))
}

/// create_post
///
/// Publishes a post with the selected categories.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid post", body = ErrorResponse)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    token: SessionToken,
    Json(mut payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), PageError> {
    validation::validate_post(&payload).map_err(PageError::Validation)?;

    payload.content = payload.content.trim().to_string();
    let mut seen = HashSet::new();
    payload.category_ids.retain(|id| seen.insert(id.clone()));

    let post = state
        .backend
        .create_post(token.as_str(), &payload)
        .await
        .map_err(PageError::with_fallback("Could not publish the post."))?;

    tracing::info!(post = %post.ref_id, categories = post.categories.len(), "post created");
    Ok((StatusCode::CREATED, Json(post.redact_anonymous())))
}

// --- Profile ---

fn profile_page(user: User, session: &CookieSession) -> ProfilePage {
    ProfilePage {
        passport_number: passport_number(&user.username),
        gender_label: user.gender.label().to_string(),
        user,
        theme: session.read_theme(),
    }
}

/// get_profile
///
/// [Gated: protected] The profile card.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfilePage),
        (status = 401, description = "Session rejected", body = ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    token: SessionToken,
    session: CookieSession,
) -> Result<Json<ProfilePage>, PageError> {
    let user = state
        .backend
        .current_user(token.as_str())
        .await
        .map_err(PageError::with_fallback("Could not load your profile."))?;

    Ok(Json(profile_page(user, &session)))
}

/// update_profile
///
/// [Gated: protected] Applies a partial update. The backend addresses users by `refId`,
/// so the current user is fetched first; the refreshed record is fetched again afterwards.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = ProfilePage),
        (status = 422, description = "Invalid update", body = ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    token: SessionToken,
    session: CookieSession,
    Json(update): Json<UpdateUserRequest>,
) -> Result<Json<ProfilePage>, PageError> {
    validation::validate_profile_update(&update).map_err(PageError::Validation)?;

    let current = state
        .backend
        .current_user(token.as_str())
        .await
        .map_err(PageError::with_fallback("Could not load your profile."))?;

    state
        .backend
        .update_user(token.as_str(), &current.ref_id, &update)
        .await
        .map_err(PageError::with_fallback("Could not update the profile."))?;

    let refreshed = state
        .backend
        .current_user(token.as_str())
        .await
        .map_err(PageError::with_fallback("Could not load your profile."))?;

    tracing::info!(user = %refreshed.ref_id, "profile updated");
    Ok(Json(profile_page(refreshed, &session)))
}

/// upload_photo
///
/// [Gated: protected] Accepts a multipart `file` field holding an image and forwards it to
/// the backend. Returns the stored photo URL, which the client then saves with
/// `PUT /profile`.
#[utoipa::path(
    post,
    path = "/profile/photo",
    responses(
        (status = 200, description = "Uploaded", body = PhotoUploadResponse),
        (status = 400, description = "Missing or non-image file", body = ErrorResponse)
    )
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    token: SessionToken,
    mut multipart: Multipart,
) -> Result<Json<PhotoUploadResponse>, PageError> {
    let mut upload: Option<PhotoUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PageError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(PageError::BadRequest("Profile photo must be an image.".to_string()));
        }
        let file_name = field.file_name().unwrap_or("photo").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PageError::BadRequest(e.body_text()))?;

        upload = Some(PhotoUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| PageError::BadRequest("No photo was provided.".to_string()))?;

    let url = state
        .backend
        .upload_profile_photo(token.as_str(), upload)
        .await
        .map_err(PageError::with_fallback("Could not upload the profile photo."))?;

    Ok(Json(PhotoUploadResponse { url }))
}

// --- Theme ---

/// get_theme
#[utoipa::path(
    get,
    path = "/theme",
    responses((status = 200, description = "Current theme", body = ThemeResponse))
)]
pub async fn get_theme(session: CookieSession) -> Json<ThemeResponse> {
    Json(ThemeResponse {
        theme: session.read_theme(),
    })
}

/// set_theme
///
/// Stores the requested theme, or flips the current one when the body names none.
#[utoipa::path(
    post,
    path = "/theme",
    request_body = ThemeRequest,
    responses((status = 200, description = "Theme stored", body = ThemeResponse))
)]
pub async fn set_theme(
    session: CookieSession,
    Json(request): Json<ThemeRequest>,
) -> Json<ThemeResponse> {
    let theme = request
        .theme
        .unwrap_or_else(|| session.read_theme().toggled());
    session.write_theme(theme);
    Json(ThemeResponse { theme })
}
