use std::env;
use std::time::Duration;

use crate::gate::RouteTable;

/// AppConfig
///
/// The server's whole configuration, loaded once at startup and shared read-only through
/// the application state (pulled out via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie hardening.
    pub env: Env,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Base URL of the external backend (no trailing slash).
    pub backend_url: String,
    // Per-request timeout for backend calls.
    pub backend_timeout: Duration,
    // Route classification tables consulted by the access gate.
    pub routes: RouteTable,
    // Optional shared secret; when set, session tokens are verified as HS256 JWTs.
    pub token_secret: Option<String>,
    // Adds the `Secure` attribute to cookies.
    pub secure_cookies: bool,
}

/// Env
///
/// Local runs get pretty logs and plain-HTTP cookies; production gets JSON logs, secure
/// cookies and a mandatory backend URL.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            backend_url: "http://localhost:3001".to_string(),
            backend_timeout: Duration::from_secs(10),
            routes: RouteTable::default(),
            token_secret: None,
            secure_cookies: false,
        }
    }
}

/// Splits a comma list of paths, dropping blanks and anything not starting with `/`.
pub fn parse_route_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|route| route.starts_with('/'))
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `BACKEND_URL` is missing, so the server never starts
    /// pointed at a developer default.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let backend_url = match env {
            Env::Production => {
                env::var("BACKEND_URL").expect("FATAL: BACKEND_URL must be set in production.")
            }
            Env::Local => {
                env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
            }
        };

        let mut routes = RouteTable::default();

        if let Ok(raw) = env::var("PROTECTED_ROUTES") {
            routes.protected_prefixes = parse_route_list(&raw);
        }
        if let Ok(raw) = env::var("AUTH_ONLY_ROUTES") {
            routes.auth_only = parse_route_list(&raw);
        }
        if let Some(flag) = env::var("GATE_DENY_UNAUTHENTICATED")
            .ok()
            .and_then(|raw| parse_flag(&raw))
        {
            routes.deny_unauthenticated_globally = flag;
        }

        let backend_timeout = env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let secure_cookies = env::var("SECURE_COOKIES")
            .ok()
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(env == Env::Production);

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            backend_url,
            backend_timeout,
            routes,
            token_secret: env::var("TOKEN_SECRET").ok().filter(|s| !s.is_empty()),
            secure_cookies,
            env,
        }
    }
}
