//! Backend server module
//!
//! Serves the info, process and file-download endpoints the orchestrator talks to, with
//! per-IP rate limiting on processing and a background task that expires old files.

use crate::Result;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod payload;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod store;

pub use state::AppState;
pub use store::MediaStore;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `POST /get_video_info/`, `POST /api/video-info/` - Resolve a URL to preview metadata
/// - `POST /process/`, `POST /api/process/` - Download the media and return its location
/// - `GET /download/:filename` - Serve a processed file
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/health", get(routes::health_check))
        .route("/get_video_info/", post(routes::video_info))
        .route("/api/video-info/", post(routes::video_info))
        .route("/process/", post(routes::process_video))
        .route("/api/process/", post(routes::process_video))
        .route("/download/:filename", get(routes::download_file))
        .with_state(state);

    // Apply rate limiting middleware if enabled in config
    let router = if config.server.rate_limit.enabled {
        let limiter = Arc::new(rate_limit::RateLimiter::new(
            config.server.rate_limit.clone(),
        ));
        router.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ))
    } else {
        router
    };

    let router = router.layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Start the server on the configured bind address and run until `shutdown` is cancelled
///
/// The file cleanup task runs alongside the server and stops with it.
///
/// # Example
///
/// ```no_run
/// use tiktok_dl::{Config, api::{AppState, serve}, source::TikwmSource};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let source = TikwmSource::new(&config.server.source_api_url, Duration::from_secs(30))?;
/// let state = AppState::new(Arc::new(source), config);
///
/// serve(state, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(state.config.server.bind_address)
        .await
        .map_err(crate::error::Error::Io)?;
    serve_on(listener, state, shutdown.cancelled_owned()).await
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// The configuration is validated first; an invalid one is returned as
/// [`Error::Config`](crate::Error::Config) before anything is served.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = state.config.clone();
    config.validate()?;
    let address = listener.local_addr()?;

    let cleanup_token = CancellationToken::new();
    let cleanup = state.store.clone().spawn_cleanup(
        config.server.cleanup_interval,
        config.server.file_retention,
        cleanup_token.clone(),
    );

    tracing::info!(
        address = %address,
        download_dir = ?state.store.dir(),
        "API server listening"
    );

    // Must use into_make_service_with_connect_info to provide ConnectInfo<SocketAddr>
    // for the rate limiting middleware
    let result = axum::serve(
        listener,
        create_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| crate::error::Error::ApiServerError(e.to_string()));

    cleanup_token.cancel();
    if let Err(e) = cleanup.await {
        tracing::error!(error = %e, "download cleanup task failed");
    }

    tracing::info!("API server stopped");
    result
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
