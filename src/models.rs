use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Backend Records ---

/// Gender
///
/// Backend enum for the profile's gender field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    PreferNotToSay,
}

impl Gender {
    /// Display label shown on the profile card.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::PreferNotToSay => "Not specified",
        }
    }
}

/// User
///
/// The current user as returned by `GET /users/me`. `ref_id` is the stable public
/// identifier used in update URLs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub ref_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub post_count: i64,
    #[serde(default)]
    pub role: String,
}

/// Category
///
/// A post category. The backend spells the identifier both `refId` and `refid`
/// depending on the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    #[serde(alias = "refid")]
    pub ref_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// PostAuthor
///
/// The slice of the author embedded in each post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostAuthor {
    pub ref_id: String,
    pub username: String,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
}

/// Post
///
/// A feed entry with its categories and (unless anonymous) its author.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub ref_id: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub dislike_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub is_anonymous: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub user: Option<PostAuthor>,
}

impl Post {
    pub fn has_category(&self, ref_id: &str) -> bool {
        self.categories.iter().any(|c| c.ref_id == ref_id)
    }

    /// Drops the author of anonymous posts before they reach the client.
    pub fn redact_anonymous(mut self) -> Self {
        if self.is_anonymous {
            self.user = None;
        }
        self
    }
}

// --- Request Payloads (Input Schemas) ---

/// LoginForm
///
/// Body of `POST /auth/login`. `redirect_url` is the path the gate remembered; it is only
/// honored when it is a local path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// RegisterForm
///
/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// SignInRequest
///
/// What the backend's sign-in endpoint receives.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl From<&LoginForm> for SignInRequest {
    fn from(form: &LoginForm) -> Self {
        Self {
            email: form.email.trim().to_string(),
            password: form.password.clone(),
        }
    }
}

/// SignUpRequest
///
/// What the backend's sign-up endpoint receives. The password confirmation never leaves
/// this server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub terms_and_conditions: bool,
}

impl From<&RegisterForm> for SignUpRequest {
    fn from(form: &RegisterForm) -> Self {
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password.clone(),
            terms_and_conditions: form.terms_accepted,
        }
    }
}

/// UpdateUserRequest
///
/// Partial profile update (`PUT /profile`), forwarded to `PUT /users/ref/{refId}`.
/// Only provided fields are serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl UpdateUserRequest {
    /// Applies the provided fields onto a user record.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(surname) = &self.surname {
            user.surname = surname.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(photo) = &self.profile_photo {
            user.profile_photo = Some(photo.clone());
        }
        if let Some(biography) = &self.biography {
            user.biography = Some(biography.clone());
        }
        if let Some(gender) = self.gender {
            user.gender = gender;
        }
    }
}

/// CreatePostRequest
///
/// Body of `POST /posts`. `category_ids` are category `refId`s picked in the category popup.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

/// PhotoUpload
///
/// A profile photo read from the multipart body, ready to forward.
#[derive(Debug, Clone, Default)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// ThemeRequest
///
/// Body of `POST /theme`. Omitting `theme` toggles the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ThemeRequest {
    #[serde(default)]
    pub theme: Option<Theme>,
}

// --- Page Models (Output Schemas) ---

/// Theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ThemeResponse {
    pub theme: Theme,
}

/// LoginPage
///
/// What the login page needs to render: where to go after signing in, and whether to show
/// the "registration complete" banner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginPage {
    pub redirect_url: Option<String>,
    pub registered: bool,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterPage {
    pub theme: Theme,
}

/// FeedPage
///
/// Home page model: the signed-in user for the sidebar, the post feed (optionally narrowed
/// to one category) and the category list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FeedPage {
    pub user: User,
    pub posts: Vec<Post>,
    pub categories: Vec<Category>,
    pub selected_category: Option<String>,
    pub theme: Theme,
}

/// ProfilePage
///
/// The "passport" profile card.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfilePage {
    pub user: User,
    pub passport_number: String,
    pub gender_label: String,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PhotoUploadResponse {
    pub url: String,
}

/// FieldErrors
///
/// Form field name → user-facing message. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

/// ErrorResponse
///
/// Body of every non-redirect failure. `errors` is only present for validation failures.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}
