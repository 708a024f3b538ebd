use async_trait::async_trait;
use chrono::Utc;
use reqwest::{StatusCode, header, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    Category, CreatePostRequest, PhotoUpload, Post, PostAuthor, SignInRequest, SignUpRequest,
    UpdateUserRequest, User,
};

/// BackendError
///
/// How a call to the external backend failed. `Unauthorized` is split out because pages
/// treat a rejected session differently from any other failure.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("backend rejected the credentials or session")]
    Unauthorized,

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

// 1. BackendApi Contract
/// BackendApi
///
/// Every backend call the pages make. `token` is always the raw cookie value
/// (`"Bearer ..."`), sent verbatim as the `Authorization` header.
///
/// The trait lets handler tests swap `HttpBackend` for `MockBackend` without a network.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Exchanges credentials for a backend token (without the `"Bearer "` prefix).
    async fn sign_in(&self, request: &SignInRequest) -> Result<String, BackendError>;
    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), BackendError>;
    async fn current_user(&self, token: &str) -> Result<User, BackendError>;
    async fn update_user(
        &self,
        token: &str,
        ref_id: &str,
        update: &UpdateUserRequest,
    ) -> Result<User, BackendError>;
    /// Uploads a profile photo and returns its public URL.
    async fn upload_profile_photo(
        &self,
        token: &str,
        upload: PhotoUpload,
    ) -> Result<String, BackendError>;
    async fn create_post(
        &self,
        token: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, BackendError>;
    async fn list_posts(&self, token: &str) -> Result<Vec<Post>, BackendError>;
    async fn list_categories(&self, token: &str) -> Result<Vec<Category>, BackendError>;
}

/// BackendState
///
/// Shared handle to the backend client in the application state.
pub type BackendState = Arc<dyn BackendApi>;

// 2. The Real Implementation (reqwest)
/// HttpBackend
///
/// `reqwest` client bound to the backend base URL. One client is built at startup and
/// reused, so connections are pooled across requests.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SignInResponse {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Deserialize)]
struct BackendMessage {
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Checks the status and decodes the body. 401/403 map to `Unauthorized`; any other
    /// non-success carries the backend's `message` field when it has one.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let response = Self::check_status(response).await?;
        response.json::<T>().await.map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            message: extract_message(&body),
        })
    }
}

/// Pulls a readable message out of an error body. NestJS-style backends send either a
/// string or an array of strings under `message`.
fn extract_message(body: &str) -> String {
    match serde_json::from_str::<BackendMessage>(body) {
        Ok(BackendMessage {
            message: Some(serde_json::Value::String(message)),
        }) => message,
        Ok(BackendMessage {
            message: Some(serde_json::Value::Array(items)),
        }) => items
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn sign_in(&self, request: &SignInRequest) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;

        let body: SignInResponse = Self::read_json(response).await?;
        Ok(body.access_token)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(request)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<User, BackendError> {
        let response = self
            .client
            .get(self.url("/users/me"))
            .header(header::AUTHORIZATION, token)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn update_user(
        &self,
        token: &str,
        ref_id: &str,
        update: &UpdateUserRequest,
    ) -> Result<User, BackendError> {
        let response = self
            .client
            .put(self.url(&format!("/users/ref/{}", ref_id)))
            .header(header::AUTHORIZATION, token)
            .json(update)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn upload_profile_photo(
        &self,
        token: &str,
        upload: PhotoUpload,
    ) -> Result<String, BackendError> {
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| BackendError::Network(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/users/upload-profile-photo"))
            .header(header::AUTHORIZATION, token)
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = Self::read_json(response).await?;
        Ok(body.url)
    }

    async fn create_post(
        &self,
        token: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, BackendError> {
        let response = self
            .client
            .post(self.url("/posts"))
            .header(header::AUTHORIZATION, token)
            .json(request)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn list_posts(&self, token: &str) -> Result<Vec<Post>, BackendError> {
        let response = self
            .client
            .get(self.url("/posts/get-all-posts-with-relations"))
            .header(header::AUTHORIZATION, token)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn list_categories(&self, token: &str) -> Result<Vec<Category>, BackendError> {
        let response = self
            .client
            .get(self.url("/categories"))
            .header(header::AUTHORIZATION, token)
            .send()
            .await?;

        Self::read_json(response).await
    }
}

// 3. The Mock Implementation (For Tests)
/// MockBackend
///
/// In-memory stand-in for the backend. Holds one user, a post list and a category list;
/// profile updates and new posts are applied to that state so follow-up reads see them.
///
/// `should_fail` turns every call into a `Status` error; `reject_session` turns every
/// token-bearing call into `Unauthorized`.
pub struct MockBackend {
    pub should_fail: bool,
    pub reject_session: bool,
    /// The only credentials `sign_in` accepts.
    pub password: String,
    user: RwLock<User>,
    posts: RwLock<Vec<Post>>,
    categories: Vec<Category>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let categories = vec![
            Category {
                ref_id: "cat-philosophy".to_string(),
                name: "Philosophy".to_string(),
                description: Some("Thinking about thinking".to_string()),
            },
            Category {
                ref_id: "cat-tech".to_string(),
                name: "Technology".to_string(),
                description: None,
            },
        ];

        let author = PostAuthor {
            ref_id: "user-1".to_string(),
            username: "deepthinker".to_string(),
            profile_photo_url: None,
        };
        let now = Utc::now();
        let posts = vec![
            Post {
                ref_id: "post-1".to_string(),
                content: "Is a thought you never finish still a thought?".to_string(),
                image_url: None,
                like_count: 3,
                dislike_count: 0,
                comment_count: 1,
                view_count: 10,
                is_anonymous: false,
                created_at: now,
                updated_at: now,
                categories: vec![categories[0].clone()],
                user: Some(author.clone()),
            },
            Post {
                ref_id: "post-2".to_string(),
                content: "I rewrote my side project in Rust again.".to_string(),
                image_url: None,
                like_count: 7,
                dislike_count: 1,
                comment_count: 4,
                view_count: 42,
                is_anonymous: true,
                created_at: now,
                updated_at: now,
                categories: vec![categories[1].clone()],
                user: Some(author),
            },
        ];

        Self {
            should_fail: false,
            reject_session: false,
            password: "password123".to_string(),
            user: RwLock::new(User {
                ref_id: "user-1".to_string(),
                name: "Deniz".to_string(),
                surname: "Yilmaz".to_string(),
                username: "deepthinker".to_string(),
                email: "deniz@example.com".to_string(),
                role: "user".to_string(),
                post_count: 2,
                ..Default::default()
            }),
            posts: RwLock::new(posts),
            categories,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn new_rejecting_session() -> Self {
        Self {
            reject_session: true,
            ..Self::new()
        }
    }

    pub fn user(&self) -> User {
        self.user.read().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.read().map(|p| p.clone()).unwrap_or_default()
    }

    fn guard(&self, token: Option<&str>) -> Result<(), BackendError> {
        if self.should_fail {
            return Err(BackendError::Status {
                status: 500,
                message: "Mock Backend Error: Simulation requested".to_string(),
            });
        }
        if token.is_some() && self.reject_session {
            return Err(BackendError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn sign_in(&self, request: &SignInRequest) -> Result<String, BackendError> {
        self.guard(None)?;
        if request.email == self.user().email && request.password == self.password {
            Ok(format!("mock-{}", Uuid::new_v4().simple()))
        } else {
            Err(BackendError::Unauthorized)
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), BackendError> {
        self.guard(None)?;
        if request.email == self.user().email {
            return Err(BackendError::Status {
                status: 409,
                message: "Email is already registered".to_string(),
            });
        }
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<User, BackendError> {
        self.guard(Some(token))?;
        Ok(self.user())
    }

    async fn update_user(
        &self,
        token: &str,
        ref_id: &str,
        update: &UpdateUserRequest,
    ) -> Result<User, BackendError> {
        self.guard(Some(token))?;
        let mut user = self
            .user
            .write()
            .map_err(|_| BackendError::Network("mock state poisoned".to_string()))?;
        if user.ref_id != ref_id {
            return Err(BackendError::Status {
                status: 404,
                message: "User not found".to_string(),
            });
        }
        update.apply_to(&mut user);
        Ok(user.clone())
    }

    async fn upload_profile_photo(
        &self,
        token: &str,
        upload: PhotoUpload,
    ) -> Result<String, BackendError> {
        self.guard(Some(token))?;
        Ok(format!(
            "http://localhost:3001/uploads/{}-{}",
            Uuid::new_v4().simple(),
            upload.file_name
        ))
    }

    async fn create_post(
        &self,
        token: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, BackendError> {
        self.guard(Some(token))?;
        let user = self.user();
        let now = Utc::now();
        let post = Post {
            ref_id: format!("post-{}", Uuid::new_v4().simple()),
            content: request.content.clone(),
            image_url: request.image_url.clone(),
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
            view_count: 0,
            is_anonymous: request.is_anonymous,
            created_at: now,
            updated_at: now,
            categories: self
                .categories
                .iter()
                .filter(|c| request.category_ids.contains(&c.ref_id))
                .cloned()
                .collect(),
            user: Some(PostAuthor {
                ref_id: user.ref_id,
                username: user.username,
                profile_photo_url: user.profile_photo,
            }),
        };

        let mut posts = self
            .posts
            .write()
            .map_err(|_| BackendError::Network("mock state poisoned".to_string()))?;
        posts.insert(0, post.clone());
        Ok(post)
    }

    async fn list_posts(&self, token: &str) -> Result<Vec<Post>, BackendError> {
        self.guard(Some(token))?;
        Ok(self.posts())
    }

    async fn list_categories(&self, token: &str) -> Result<Vec<Category>, BackendError> {
        self.guard(Some(token))?;
        Ok(self.categories.clone())
    }
}
