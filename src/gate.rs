use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

use crate::{auth::VerifierState, config::AppConfig, session::{CookieSession, SessionStore}};

/// The literal prefix every session token must carry to be considered syntactically valid.
pub const TOKEN_PREFIX: &str = "Bearer ";

/// Name of the query parameter carrying the originally requested path to the login page.
pub const REDIRECT_PARAM: &str = "redirectUrl";

/// is_valid_token
///
/// Shallow, purely syntactic check: the token must be non-empty and start with `"Bearer "`.
/// Nothing after the prefix is parsed or verified.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.starts_with(TOKEN_PREFIX)
}

/// RouteTable
///
/// Static classification tables consulted by the gate. Built once from `AppConfig` and
/// shared read-only across requests.
#[derive(Clone, Debug)]
pub struct RouteTable {
    pub home_path: String,
    pub login_path: String,
    pub register_path: String,
    /// Exact or path-prefix matches requiring a valid token.
    pub protected_prefixes: Vec<String>,
    /// Exact matches reachable only without a valid token.
    pub auth_only: Vec<String>,
    /// When set, any unauthenticated request outside login/register is sent to the login page
    /// before the per-route table is consulted.
    pub deny_unauthenticated_globally: bool,
    /// Path prefixes the middleware never gates (health checks, API docs).
    pub exempt_prefixes: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            home_path: "/".to_string(),
            login_path: "/auth/login".to_string(),
            register_path: "/auth/register".to_string(),
            protected_prefixes: vec!["/profile".to_string()],
            auth_only: vec!["/auth/login".to_string(), "/auth/register".to_string()],
            deny_unauthenticated_globally: true,
            exempt_prefixes: vec![
                "/health".to_string(),
                "/swagger-ui".to_string(),
                "/api-docs".to_string(),
            ],
        }
    }
}

/// RouteClass
///
/// The class a path falls into, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    Home,
    Protected,
    AuthOnly,
    Public,
}

impl RouteTable {
    /// classify
    ///
    /// Pure function of the path string. Home wins over everything, then Protected
    /// (exact or segment prefix), then AuthOnly (exact), then Public.
    pub fn classify(&self, path: &str) -> RouteClass {
        if path == self.home_path {
            RouteClass::Home
        } else if self
            .protected_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            RouteClass::Protected
        } else if self.auth_only.iter().any(|route| route == path) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    /// True for the login and registration paths themselves.
    pub fn is_auth_entry(&self, path: &str) -> bool {
        path == self.login_path || path == self.register_path
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
    }
}

/// Segment-aware prefix match: `/profile` covers `/profile` and `/profile/edit`, not `/profiles`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// normalize_path
///
/// Collapses a trailing slash (except for the root) so `/profile/` and `/profile` classify
/// the same way.
pub fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    } else if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// GateOutcome
///
/// The only four things the gate can decide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    RedirectToLogin,
    /// Redirect to login, remembering the original path for the post-login redirect.
    RedirectToLoginWithReturn(String),
    RedirectToHome,
}

impl GateOutcome {
    /// location
    ///
    /// The `Location` a redirect outcome points at, or `None` for `Allow`.
    pub fn location(&self, routes: &RouteTable) -> Option<String> {
        match self {
            GateOutcome::Allow => None,
            GateOutcome::RedirectToLogin => Some(routes.login_path.clone()),
            GateOutcome::RedirectToLoginWithReturn(path) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(REDIRECT_PARAM, path)
                    .finish();
                Some(format!("{}?{}", routes.login_path, query))
            }
            GateOutcome::RedirectToHome => Some(routes.home_path.clone()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Allow => "allow",
            GateOutcome::RedirectToLogin => "redirect_to_login",
            GateOutcome::RedirectToLoginWithReturn(_) => "redirect_to_login_with_return",
            GateOutcome::RedirectToHome => "redirect_to_home",
        }
    }
}

/// decide
///
/// The gate decision over `(path, token)` using the syntactic token check.
pub fn decide(routes: &RouteTable, path: &str, token: Option<&str>) -> GateOutcome {
    let has_valid_token = token.is_some_and(is_valid_token);
    decide_with(routes, path, has_valid_token)
}

/// decide_with
///
/// Same decision table, taking token validity as already computed (so a stronger verifier
/// can be plugged in without touching the ordering).
///
/// Order matters: the global unauthenticated check runs before the home escape hatch,
/// which makes the per-route "no token" branches unreachable for everything except the
/// login and registration paths. Set `deny_unauthenticated_globally` to `false` to reach them.
pub fn decide_with(routes: &RouteTable, path: &str, has_valid_token: bool) -> GateOutcome {
    if routes.deny_unauthenticated_globally && !has_valid_token && !routes.is_auth_entry(path) {
        return GateOutcome::RedirectToLogin;
    }

    match routes.classify(path) {
        RouteClass::Home => GateOutcome::Allow,
        RouteClass::Protected if !has_valid_token => {
            GateOutcome::RedirectToLoginWithReturn(path.to_string())
        }
        RouteClass::Protected => GateOutcome::Allow,
        RouteClass::AuthOnly if has_valid_token => GateOutcome::RedirectToHome,
        RouteClass::AuthOnly => GateOutcome::Allow,
        RouteClass::Public => GateOutcome::Allow,
    }
}

/// is_local_path
///
/// Accepts only same-origin absolute paths as post-login redirect targets.
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// AccessGate
///
/// Request-time bundle of the route tables and the configured token verifier.
#[derive(Clone)]
pub struct AccessGate {
    pub routes: RouteTable,
    pub verifier: VerifierState,
}

impl AccessGate {
    pub fn new(routes: RouteTable, verifier: VerifierState) -> Self {
        Self { routes, verifier }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.routes.clone(), crate::auth::verifier_for(config))
    }

    /// evaluate
    ///
    /// Runs the decision for a raw request path and cookie value.
    pub fn evaluate(&self, path: &str, token: Option<&str>) -> GateOutcome {
        let path = normalize_path(path);
        let has_valid_token = token.is_some_and(|t| self.verifier.verify(t));
        decide_with(&self.routes, path, has_valid_token)
    }

    /// evaluate_session
    ///
    /// Reads the token through the injected session store and evaluates. Never writes.
    pub fn evaluate_session(&self, path: &str, session: &dyn SessionStore) -> GateOutcome {
        self.evaluate(path, session.read_token().as_deref())
    }
}

/// access_gate
///
/// Axum adapter around `AccessGate::evaluate`. Reads the `token` cookie through the session
/// store, then either forwards the request or answers with a `307 Temporary Redirect`.
pub async fn access_gate(
    State(gate): State<AccessGate>,
    session: CookieSession,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if gate.routes.is_exempt(&path) {
        return next.run(request).await;
    }

    let outcome = gate.evaluate_session(&path, &session);

    tracing::debug!(
        path = %path,
        outcome = outcome.as_str(),
        "access gate decision"
    );

    match outcome.location(&gate.routes) {
        None => next.run(request).await,
        Some(location) => {
            tracing::info!(path = %path, location = %location, "access gate redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
