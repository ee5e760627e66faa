//! Console download example
//!
//! Drives the orchestrator against a running backend (see the `backend_server` example),
//! printing events as they arrive and saving the file once navigation is requested.
//!
//! ```bash
//! cargo run --example console_download -- https://www.tiktok.com/@user/video/7234567890 [hd|sd|audio]
//! ```

use std::path::PathBuf;
use tiktok_dl::presenter::{render_events, submit_label};
use tiktok_dl::utils::save_download;
use tiktok_dl::{Config, DownloadOptions, Orchestrator, Quality};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiktok_dl=warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_default();
    let quality: Quality = args.next().as_deref().unwrap_or("hd").parse()?;

    let options = DownloadOptions {
        quality,
        format: quality.format(),
        ..DownloadOptions::default()
    };

    let orchestrator = Orchestrator::new(Config::default())?;
    let printer = tokio::spawn(render_events(orchestrator.subscribe(), std::io::stdout()));

    if orchestrator.fetch_info(&url).await?.is_busy() {
        return Ok(());
    }

    println!("> {}", submit_label(options.format));
    let download_url = orchestrator
        .process_download(&options)
        .await?
        .into_inner()
        .unwrap_or_default();

    let dir = PathBuf::from("downloads");
    let path = save_download(&reqwest::Client::new(), &download_url, &dir).await?;
    println!("Saved {}", path.display());

    // Closing the event channel lets the printer finish
    drop(orchestrator);
    printer.await??;
    Ok(())
}
