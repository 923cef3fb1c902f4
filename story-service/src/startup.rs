//! Application startup and lifecycle management.

use crate::config::StoryConfig;
use crate::handlers;
use crate::middleware::{metrics_middleware, record_generation};
use crate::services::generation::gemini::GeminiConfig;
use crate::services::{
    GeminiClient, GenerationClient, InMemorySessionStore, SessionStore, SESSION_IDLE_TIMEOUT,
};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use service_core::error::{AppError, ErrorResponse};
use service_core::middleware::{request_id_middleware, security_headers_middleware, RequestId};
use sha2::{Digest, Sha512};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

pub const GENERATE_PATH: &str = "/api/generate";
pub const LOGS_PATH: &str = "/api/logs";

/// How often idle session logs are swept.
const SESSION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: StoryConfig,
    pub generator: Arc<dyn GenerationClient>,
    pub session_store: Arc<dyn SessionStore>,
}

/// Catch-all for panics inside request handling.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    tracing::error!(details = %details, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Something broke on the server!".to_string(),
            details: Some(details),
        }),
    )
        .into_response()
}

/// Build the HTTP router with sessions, logging and hardening layers.
pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Cookie signing key: 64 bytes derived from the configured secret
    let digest = Sha512::digest(state.config.session.secret.expose_secret().as_bytes());
    let key = Key::from(digest.as_slice());

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.common.is_production())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_IDLE_TIMEOUT.as_secs() as i64,
        )))
        .with_signed(key);

    let origin: HeaderValue = state.config.cors.allowed_origin.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "Invalid CORS origin '{}': {}",
            state.config.cors.allowed_origin,
            e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(GENERATE_PATH, post(handlers::generate_story))
        .route(LOGS_PATH, get(handlers::get_logs))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), record_generation))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.as_str())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    session_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state);

    Ok(router)
}

/// Periodically drop session logs whose cookie session has expired.
async fn sweep_idle_sessions(store: Arc<dyn SessionStore>) {
    let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        match store.evict_idle().await {
            Ok(0) => {}
            Ok(evicted) => tracing::info!(evicted, "Evicted idle session logs"),
            Err(e) => tracing::warn!(error = %e, "Failed to evict idle session logs"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application with the Gemini client and in-memory session store.
    pub async fn build(config: StoryConfig) -> Result<Self, AppError> {
        let gemini = GeminiClient::new(GeminiConfig::new(&config.gemini, &config.generation))
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        // A missing key must not stop the process; /ready reports it instead
        match gemini.readiness() {
            Ok(()) => tracing::info!(model = %gemini.model(), "Initialized Gemini generation client"),
            Err(e) => tracing::warn!(error = %e, "Gemini client not ready; generation requests will fail"),
        }

        Self::build_with(
            config,
            Arc::new(gemini),
            Arc::new(InMemorySessionStore::new()),
        )
        .await
    }

    /// Build the application around explicit collaborators.
    pub async fn build_with(
        config: StoryConfig,
        generator: Arc<dyn GenerationClient>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        let state = AppState {
            config: config.clone(),
            generator,
            session_store,
        };
        let router = build_router(state.clone())?;

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.state.session_store.clone()
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let sweeper = tokio::spawn(sweep_idle_sessions(self.state.session_store.clone()));

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        sweeper.abort();
        result
    }
}
