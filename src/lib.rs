//! # tiktok-dl
//!
//! Download request orchestration for a TikTok video downloader, plus the thin backend it
//! talks to.
//!
//! ## Design Philosophy
//!
//! tiktok-dl is designed to be:
//! - **Sensible defaults** - Works against a local backend with zero configuration
//! - **Library-first** - No UI; the orchestrator emits events and callers render them
//! - **Event-driven** - Consumers subscribe to state changes, previews and notices
//! - **One request at a time** - Submissions during an in-flight call are dropped
//!
//! ## Quick Start
//!
//! ```no_run
//! use tiktok_dl::{Config, DownloadOptions, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     orchestrator
//!         .fetch_info("https://www.tiktok.com/@user/video/7234567890")
//!         .await?;
//!     orchestrator
//!         .process_download(&DownloadOptions::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Backend server module
pub mod api;
/// Backend client for the info and process endpoints
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Download request orchestration
pub mod orchestrator;
/// Text rendering of orchestrator events
pub mod presenter;
/// Retry logic with exponential backoff
pub mod retry;
/// Media sources for the backend server
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// URL validation
pub mod validation;

// Re-export commonly used types
pub use client::{BackendClient, HttpBackend};
pub use config::{Config, FlowPolicy, RequestEncoding, RetryConfig};
pub use error::{Error, ErrorEnvelope, Result, ToHttpStatus, ValidationError};
pub use orchestrator::Orchestrator;
pub use types::{
    Dispatch, DownloadOptions, DownloadRequest, Event, MediaFormat, NoticeLevel, Operation,
    OrchestratorState, Outcome, Quality, VideoInfo,
};

/// Helper function to run the backend server with graceful signal handling.
///
/// Binds `state.config.server.bind_address`, serves until a termination signal arrives and
/// then stops the server and its cleanup task.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use tiktok_dl::{Config, api::AppState, run_with_shutdown, source::TikwmSource};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Arc::new(Config::default());
///     let source = TikwmSource::new(&config.server.source_api_url, Duration::from_secs(30))?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(AppState::new(Arc::new(source), config)).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(state: api::AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(state.config.server.bind_address).await?;
    api::serve_on(listener, state, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
