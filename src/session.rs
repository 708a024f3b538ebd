use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use std::sync::{Mutex, MutexGuard};
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration},
};

use crate::{config::AppConfig, gate::TOKEN_PREFIX, models::Theme};

/// Cookie holding the session token (`"Bearer " + <backend token>`).
pub const TOKEN_COOKIE: &str = "token";
/// Cookie holding the user's theme preference.
pub const THEME_COOKIE: &str = "theme";
/// Lifetime of the token cookie when "remember me" is requested.
pub const REMEMBER_ME_DAYS: i64 = 30;
/// Lifetime of the theme cookie.
pub const THEME_DAYS: i64 = 365;

/// SessionStore Contract
///
/// The client-side session state as an injected capability. The gate and the pages read and
/// write the session only through this trait, so tests can swap the cookie jar for the
/// in-memory `MemorySession`.
pub trait SessionStore: Send + Sync {
    /// The raw token cookie value, if any. A missing or unreadable cookie is `None`.
    fn read_token(&self) -> Option<String>;
    /// Stores the token. `remember` extends the lifetime to 30 days; otherwise the cookie is
    /// session-scoped.
    fn write_token(&self, token: &str, remember: bool);
    fn clear_token(&self);
    fn read_theme(&self) -> Theme;
    fn write_theme(&self, theme: Theme);
}

/// bearer
///
/// Normalizes a raw backend-issued token into the cookie format.
pub fn bearer(raw_token: &str) -> String {
    let raw_token = raw_token.trim();
    if raw_token.starts_with(TOKEN_PREFIX) {
        raw_token.to_string()
    } else {
        format!("{}{}", TOKEN_PREFIX, raw_token)
    }
}

/// CookieSession
///
/// Cookie-backed `SessionStore` over the `tower-cookies` jar. Changes are flushed as
/// `Set-Cookie` headers by the `CookieManagerLayer` when the response leaves the router.
#[derive(Clone)]
pub struct CookieSession {
    cookies: Cookies,
    secure: bool,
}

impl CookieSession {
    pub fn new(cookies: Cookies, secure: bool) -> Self {
        Self { cookies, secure }
    }

    fn base_cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

impl SessionStore for CookieSession {
    fn read_token(&self) -> Option<String> {
        self.cookies
            .get(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn write_token(&self, token: &str, remember: bool) {
        let mut cookie = self.base_cookie(TOKEN_COOKIE, token.to_string());
        if remember {
            cookie.set_max_age(Duration::days(REMEMBER_ME_DAYS));
        }
        self.cookies.add(cookie);
    }

    fn clear_token(&self) {
        self.cookies
            .remove(Cookie::build(TOKEN_COOKIE).path("/").build());
    }

    fn read_theme(&self) -> Theme {
        self.cookies
            .get(THEME_COOKIE)
            .and_then(|cookie| Theme::parse(cookie.value()))
            .unwrap_or_default()
    }

    fn write_theme(&self, theme: Theme) {
        let mut cookie = self.base_cookie(THEME_COOKIE, theme.as_str().to_string());
        // The client script reads the theme before first paint.
        cookie.set_http_only(false);
        cookie.set_max_age(Duration::days(THEME_DAYS));
        self.cookies.add(cookie);
    }
}

/// CookieSession Extractor
///
/// Requires the `CookieManagerLayer` to wrap the router; without it the `Cookies`
/// extension is missing and the request is rejected with a 500.
impl<S> FromRequestParts<S> for CookieSession
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await?;
        let config = AppConfig::from_ref(state);
        Ok(CookieSession::new(cookies, config.secure_cookies))
    }
}

/// StoredToken
///
/// What `MemorySession` remembers about the token write, so tests can assert on the
/// "remember me" flag as well as the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredToken {
    pub value: String,
    pub remember: bool,
}

/// MemorySession
///
/// In-memory `SessionStore` for tests.
#[derive(Default)]
pub struct MemorySession {
    token: Mutex<Option<StoredToken>>,
    theme: Mutex<Option<Theme>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a token already present, as if the browser sent the cookie.
    pub fn with_token(token: &str) -> Self {
        let session = Self::default();
        session.write_token(token, false);
        session
    }

    pub fn stored_token(&self) -> Option<StoredToken> {
        lock(&self.token).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionStore for MemorySession {
    fn read_token(&self) -> Option<String> {
        lock(&self.token)
            .as_ref()
            .map(|stored| stored.value.clone())
            .filter(|value| !value.is_empty())
    }

    fn write_token(&self, token: &str, remember: bool) {
        *lock(&self.token) = Some(StoredToken {
            value: token.to_string(),
            remember,
        });
    }

    fn clear_token(&self) {
        *lock(&self.token) = None;
    }

    fn read_theme(&self) -> Theme {
        let theme = *lock(&self.theme);
        theme.unwrap_or_default()
    }

    fn write_theme(&self, theme: Theme) {
        *lock(&self.theme) = Some(theme);
    }
}
