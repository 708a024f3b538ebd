use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use overthink_portal::{
    AppState,
    auth::SessionToken,
    backend::{BackendApi, BackendError},
    config::AppConfig,
    error::PageError,
    handlers,
    models::{
        Category, CreatePostRequest, PhotoUpload, Post, RegisterForm, SignInRequest,
        SignUpRequest, UpdateUserRequest, User,
    },
};
use std::sync::{Arc, Mutex};
use tokio::test;

// --- RECORDING BACKEND ---

// Records what the handlers forward so tests can check the exact backend calls.
#[derive(Default)]
pub struct RecordingBackend {
    pub sign_up_input: Mutex<Option<SignUpRequest>>,
    pub create_post_input: Mutex<Option<(String, CreatePostRequest)>>,
    pub tokens_seen: Mutex<Vec<String>>,
    pub categories_to_return: Vec<Category>,
    pub sign_up_error: Option<u16>,
}

impl RecordingBackend {
    fn saw(&self, token: &str) {
        self.tokens_seen.lock().unwrap().push(token.to_string());
    }
}

#[async_trait]
impl BackendApi for RecordingBackend {
    async fn sign_in(&self, _request: &SignInRequest) -> Result<String, BackendError> {
        Err(BackendError::Unauthorized)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), BackendError> {
        *self.sign_up_input.lock().unwrap() = Some(request.clone());
        match self.sign_up_error {
            Some(status) => Err(BackendError::Status {
                status,
                message: String::new(),
            }),
            None => Ok(()),
        }
    }

    async fn current_user(&self, token: &str) -> Result<User, BackendError> {
        self.saw(token);
        Ok(User::default())
    }

    async fn update_user(
        &self,
        token: &str,
        _ref_id: &str,
        _update: &UpdateUserRequest,
    ) -> Result<User, BackendError> {
        self.saw(token);
        Ok(User::default())
    }

    async fn upload_profile_photo(
        &self,
        token: &str,
        _upload: PhotoUpload,
    ) -> Result<String, BackendError> {
        self.saw(token);
        Ok(String::new())
    }

    async fn create_post(
        &self,
        token: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, BackendError> {
        *self.create_post_input.lock().unwrap() = Some((token.to_string(), request.clone()));
        let now = chrono::Utc::now();
        Ok(Post {
            ref_id: "p-1".to_string(),
            content: request.content.clone(),
            image_url: None,
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
            view_count: 0,
            is_anonymous: request.is_anonymous,
            created_at: now,
            updated_at: now,
            categories: vec![],
            user: None,
        })
    }

    async fn list_posts(&self, token: &str) -> Result<Vec<Post>, BackendError> {
        self.saw(token);
        Ok(vec![])
    }

    async fn list_categories(&self, token: &str) -> Result<Vec<Category>, BackendError> {
        self.saw(token);
        Ok(self.categories_to_return.clone())
    }
}

// --- TEST UTILITIES ---

const TOKEN: &str = "Bearer handler-test";

fn create_test_state(backend: Arc<RecordingBackend>) -> AppState {
    AppState::new(AppConfig::default(), backend)
}

fn token() -> SessionToken {
    SessionToken(TOKEN.to_string())
}

fn register_form() -> RegisterForm {
    RegisterForm {
        name: "  Deniz Yilmaz ".to_string(),
        email: "deniz@example.com".to_string(),
        password: "password123".to_string(),
        confirm_password: "password123".to_string(),
        terms_accepted: true,
    }
}

// --- HANDLER TESTS ---

#[test]
async fn test_register_forwards_trimmed_sign_up() {
    let backend = Arc::new(RecordingBackend::default());
    let state = create_test_state(backend.clone());

    let result = handlers::register(State(state), Json(register_form())).await;

    let response = result.unwrap().into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
        "/auth/login?registered=true"
    );

    let sent = backend.sign_up_input.lock().unwrap().clone().unwrap();
    assert_eq!(sent.name, "Deniz Yilmaz");
    assert!(sent.terms_and_conditions);
}

#[test]
async fn test_register_validation_skips_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let state = create_test_state(backend.clone());

    let form = RegisterForm {
        terms_accepted: false,
        ..register_form()
    };
    let result = handlers::register(State(state), Json(form)).await;

    match result {
        Err(PageError::Validation(errors)) => assert!(errors.contains_key("termsAccepted")),
        _ => panic!("expected a validation error"),
    }
    assert!(backend.sign_up_input.lock().unwrap().is_none());
}

#[test]
async fn test_register_backend_failure_uses_fallback_message() {
    let backend = Arc::new(RecordingBackend {
        sign_up_error: Some(500),
        ..RecordingBackend::default()
    });
    let state = create_test_state(backend);

    let result = handlers::register(State(state), Json(register_form())).await;

    let response = result.unwrap_err().into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let (_parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body["message"],
        "Could not create the account. Please check your details."
    );
}

#[test]
async fn test_list_categories_forwards_session_token() {
    let backend = Arc::new(RecordingBackend {
        categories_to_return: vec![Category {
            ref_id: "c-1".to_string(),
            name: "Tech".to_string(),
            description: None,
        }],
        ..RecordingBackend::default()
    });
    let state = create_test_state(backend.clone());

    let Json(categories) = handlers::list_categories(State(state), token())
        .await
        .unwrap();

    assert_eq!(categories.len(), 1);
    assert_eq!(*backend.tokens_seen.lock().unwrap(), vec![TOKEN.to_string()]);
}

#[test]
async fn test_create_post_forwards_cleaned_payload() {
    let backend = Arc::new(RecordingBackend::default());
    let state = create_test_state(backend.clone());

    let payload = CreatePostRequest {
        content: "\n  a thought  \n".to_string(),
        is_anonymous: true,
        category_ids: vec!["c-2".into(), "c-1".into(), "c-2".into()],
        ..Default::default()
    };
    let (status, Json(post)) = handlers::create_post(State(state), token(), Json(payload))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.content, "a thought");

    let (sent_token, sent) = backend.create_post_input.lock().unwrap().clone().unwrap();
    assert_eq!(sent_token, TOKEN);
    assert_eq!(sent.category_ids, vec!["c-2", "c-1"]);
}

#[test]
async fn test_post_login_target_only_accepts_local_paths() {
    assert_eq!(handlers::post_login_target(Some("/profile"), "/"), "/profile");
    assert_eq!(handlers::post_login_target(Some(" /profile "), "/"), "/profile");
    assert_eq!(handlers::post_login_target(Some("//evil.example.com"), "/"), "/");
    assert_eq!(handlers::post_login_target(Some("https://x.y"), "/"), "/");
    assert_eq!(handlers::post_login_target(None, "/"), "/");
}
