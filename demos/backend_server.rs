//! Backend server example
//!
//! Runs the info/process/download endpoints on http://127.0.0.1:8000, resolving media
//! through the tikwm API and writing files to `./downloads`.
//!
//! After starting, you can:
//! - Check health via GET http://127.0.0.1:8000/health
//! - Preview a video via POST http://127.0.0.1:8000/api/video-info/ with `{"url": "..."}`
//! - Download via POST http://127.0.0.1:8000/api/process/ with `{"url": "...", "quality": "hd"}`
//!
//! Stop with Ctrl+C.

use std::sync::Arc;
use std::time::Duration;
use tiktok_dl::api::AppState;
use tiktok_dl::source::TikwmSource;
use tiktok_dl::{Config, run_with_shutdown};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tiktok_dl=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .init();

    let config = Config::default();
    config.validate()?;

    let source = TikwmSource::new(&config.server.source_api_url, Duration::from_secs(30))?;
    let state = AppState::new(Arc::new(source), Arc::new(config));

    run_with_shutdown(state).await?;
    Ok(())
}
