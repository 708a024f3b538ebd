use overthink_portal::{
    AppConfig, AppState, BackendState, MockBackend, create_router, gate::RouteTable,
    handlers::passport_number,
};
use reqwest::{StatusCode, header, multipart, redirect::Policy};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

const SESSION: &str = "token=Bearer abc123";

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

async fn spawn_app_with(backend: MockBackend, config: AppConfig) -> TestApp {
    let state = AppState::new(config, Arc::new(backend) as BackendState);
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("Failed to build test client");

    TestApp { address, client }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(MockBackend::new(), AppConfig::default()).await
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

// --- Gate ---

#[tokio::test]
async fn test_health_check_is_not_gated() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_docs_are_not_gated() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_visitors_are_sent_to_login() {
    let app = spawn_app().await;

    for path in ["/", "/profile", "/settings", "/categories"] {
        let response = app.client.get(app.url(path)).send().await.expect("req fail");
        assert_eq!(
            response.status(),
            StatusCode::TEMPORARY_REDIRECT,
            "path {path}"
        );
        assert_eq!(location(&response), "/auth/login", "path {path}");
    }
}

#[tokio::test]
async fn test_signed_in_user_is_sent_home_from_auth_pages() {
    let app = spawn_app().await;

    for path in ["/auth/login", "/auth/register"] {
        let response = app
            .client
            .get(app.url(path))
            .header(header::COOKIE, SESSION)
            .send()
            .await
            .expect("req fail");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
    }
}

#[tokio::test]
async fn test_signed_in_user_passes_through_unrouted_paths() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/settings"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_cookie_counts_as_no_session() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/auth/login"))
        .header(header::COOKIE, "token=abc123")
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_per_route_table_remembers_protected_path() {
    let config = AppConfig {
        routes: RouteTable {
            deny_unauthenticated_globally: false,
            ..RouteTable::default()
        },
        ..AppConfig::default()
    };
    let app = spawn_app_with(MockBackend::new(), config).await;

    let response = app.client.get(app.url("/profile")).send().await.expect("req fail");
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/auth/login?redirectUrl=%2Fprofile");

    // Unprotected pages still need a backend session.
    let response = app.client.get(app.url("/categories")).send().await.expect("req fail");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_strict_verifier_rejects_unsigned_tokens() {
    let config = AppConfig {
        token_secret: Some("shared-secret".to_string()),
        ..AppConfig::default()
    };
    let app = spawn_app_with(MockBackend::new(), config).await;

    let response = app
        .client
        .get(app.url("/"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/auth/login");
}

// --- Login / Register / Logout ---

#[tokio::test]
async fn test_login_page_echoes_local_redirect_only() {
    let app = spawn_app().await;

    let page: Value = app
        .client
        .get(app.url("/auth/login?redirectUrl=%2Fprofile&registered=true"))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(page["redirectUrl"], "/profile");
    assert_eq!(page["registered"], true);
    assert_eq!(page["theme"], "light");

    let page: Value = app
        .client
        .get(app.url("/auth/login?redirectUrl=%2F%2Fevil.example.com"))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert!(page["redirectUrl"].is_null());
}

#[tokio::test]
async fn test_login_sets_bearer_cookie_and_redirects() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({
            "email": "deniz@example.com",
            "password": "password123",
            "redirectUrl": "/profile"
        }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let cookies = set_cookies(&response);
    let token = cookies
        .iter()
        .find(|c| c.starts_with("token="))
        .expect("token cookie missing");
    assert!(token.starts_with("token=Bearer"));
    assert!(token.contains("HttpOnly"));
    assert!(token.contains("Path=/"));
    assert!(!token.contains("Max-Age"));
}

#[tokio::test]
async fn test_login_remember_me_extends_cookie() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({
            "email": "deniz@example.com",
            "password": "password123",
            "rememberMe": true,
            "redirectUrl": "//evil.example.com"
        }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("token=") && c.contains("Max-Age=2592000"))
    );
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "deniz@example.com", "password": "nope" }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Could not sign in. Please check your details.");
}

#[tokio::test]
async fn test_login_validation_errors() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "nope" }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errors"]["email"], "Enter a valid email address");
    assert_eq!(body["errors"]["password"], "Password is required");
}

#[tokio::test]
async fn test_register_redirects_to_login_banner() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "New Thinker",
            "email": "new@example.com",
            "password": "password123",
            "confirmPassword": "password123",
            "termsAccepted": true
        }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?registered=true");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_register_surfaces_backend_message() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "Deniz",
            "email": "deniz@example.com",
            "password": "password123",
            "confirmPassword": "password123",
            "termsAccepted": true
        }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email is already registered");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/auth/logout"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("token=") && c.contains("Max-Age=0"))
    );
}

// --- Feed / Posts ---

#[tokio::test]
async fn test_feed_loads_user_posts_and_categories() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::OK);
    let feed: Value = response.json().await.unwrap();
    assert_eq!(feed["user"]["username"], "deepthinker");
    assert_eq!(feed["posts"].as_array().unwrap().len(), 2);
    assert_eq!(feed["categories"].as_array().unwrap().len(), 2);

    let anonymous = feed["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["isAnonymous"] == true)
        .unwrap();
    assert!(anonymous["user"].is_null());
}

#[tokio::test]
async fn test_feed_filters_by_category() {
    let app = spawn_app().await;
    let feed: Value = app
        .client
        .get(app.url("/?category=cat-philosophy"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();

    let posts = feed["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["refId"], "post-1");
    assert_eq!(feed["selectedCategory"], "cat-philosophy");
}

#[tokio::test]
async fn test_rejected_session_reports_expiry() {
    let app = spawn_app_with(MockBackend::new_rejecting_session(), AppConfig::default()).await;
    let response = app
        .client
        .get(app.url("/"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your session has expired. Please sign in again.");
}

#[tokio::test]
async fn test_create_post_trims_and_dedups_categories() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/posts"))
        .header(header::COOKIE, SESSION)
        .json(&json!({
            "content": "  thinking about thinking  ",
            "categoryIds": ["cat-tech", "cat-tech"]
        }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::CREATED);
    let post: Value = response.json().await.unwrap();
    assert_eq!(post["content"], "thinking about thinking");
    assert_eq!(post["categories"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_empty_post_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/posts"))
        .header(header::COOKIE, SESSION)
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_categories_listing() {
    let app = spawn_app().await;
    let categories: Value = app
        .client
        .get(app.url("/categories"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(categories[0]["refId"], "cat-philosophy");
}

// --- Profile ---

#[tokio::test]
async fn test_profile_card() {
    let app = spawn_app().await;
    let profile: Value = app
        .client
        .get(app.url("/profile"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();

    assert_eq!(profile["passportNumber"], passport_number("deepthinker"));
    assert_eq!(profile["genderLabel"], "Not specified");
}

#[tokio::test]
async fn test_profile_update_returns_refreshed_user() {
    let app = spawn_app().await;
    let response = app
        .client
        .put(app.url("/profile"))
        .header(header::COOKIE, SESSION)
        .json(&json!({ "biography": "Professional overthinker", "gender": "female" }))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["user"]["biography"], "Professional overthinker");
    assert_eq!(profile["genderLabel"], "Female");
}

#[tokio::test]
async fn test_profile_backend_failure_is_bad_gateway() {
    let app = spawn_app_with(MockBackend::new_failing(), AppConfig::default()).await;
    let response = app
        .client
        .get(app.url("/profile"))
        .header(header::COOKIE, SESSION)
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Mock Backend Error: Simulation requested");
}

#[tokio::test]
async fn test_photo_upload_accepts_images_only() {
    let app = spawn_app().await;

    let image = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(vec![0x89, 0x50, 0x4e, 0x47])
            .file_name("me.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/profile/photo"))
        .header(header::COOKIE, SESSION)
        .multipart(image)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["url"].as_str().unwrap().ends_with("me.png"));

    let text = multipart::Form::new().part(
        "file",
        multipart::Part::text("hello")
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/profile/photo"))
        .header(header::COOKIE, SESSION)
        .multipart(text)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Theme ---

#[tokio::test]
async fn test_theme_toggle_round_trip() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/theme"))
        .header(header::COOKIE, SESSION)
        .json(&json!({}))
        .send()
        .await
        .expect("req fail");
    let cookies = set_cookies(&response);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["theme"], "dark");
    assert!(cookies.iter().any(|c| c.starts_with("theme=dark")));

    let body: Value = app
        .client
        .post(app.url("/theme"))
        .header(header::COOKIE, format!("{SESSION}; theme=dark"))
        .json(&json!({}))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(body["theme"], "light");

    let body: Value = app
        .client
        .get(app.url("/theme"))
        .header(header::COOKIE, format!("{SESSION}; theme=dark"))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(body["theme"], "dark");
}

// --- Helpers ---

#[test]
fn test_passport_number_matches_client_hash() {
    assert_eq!(passport_number(""), "000000000");
    assert_eq!(passport_number("a"), "000000061");
    assert_eq!(passport_number("ab"), "000000C21");

    let long = passport_number("a-considerably-longer-username");
    assert!(long.len() >= 9);
    assert!(long.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
}
