use overthink_portal::{
    AppState,
    backend::{BackendState, HttpBackend},
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the backend client and serves the portal.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter: RUST_LOG wins, otherwise verbose local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "overthink_portal=debug,tower_http=info,axum=trace".into());

    // 3. Log format per environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    tracing::info!(
        protected = ?config.routes.protected_prefixes,
        auth_only = ?config.routes.auth_only,
        deny_unauthenticated = config.routes.deny_unauthenticated_globally,
        strict_tokens = config.token_secret.is_some(),
        "access gate configured"
    );

    // 4. Backend client
    let backend = HttpBackend::new(&config.backend_url, config.backend_timeout)
        .expect("FATAL: Failed to build the backend HTTP client. Check BACKEND_URL.");
    tracing::info!(backend_url = %config.backend_url, "backend client ready");
    let backend = Arc::new(backend) as BackendState;

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(config, backend));

    // 6. Server Startup
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
