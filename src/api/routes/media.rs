//! Media handlers: video info, processing, file download

use super::{InfoRequest, ProcessRequest};
use crate::api::AppState;
use crate::api::payload::Payload;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::MediaFormat;
use crate::validation::validate_url;
use axum::{
    Json,
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Message returned by a successful process call
pub const PROCESS_SUCCESS: &str = "Video downloaded successfully!";

fn required_url(url: Option<&str>) -> Result<String> {
    match url.map(str::trim) {
        None | Some("") => Err(Error::BadRequest("URL is required".to_string())),
        Some(url) => Ok(validate_url(url)?),
    }
}

/// POST /get_video_info/ and /api/video-info/ - Resolve a URL to preview metadata
pub async fn video_info(
    State(state): State<AppState>,
    Payload(payload): Payload<InfoRequest>,
) -> Result<Json<Value>> {
    let url = required_url(payload.url.as_deref())?;
    tracing::info!(url = %url, "video info requested");

    let info = with_retry(&state.config.server.upstream_retry, || {
        state.source.video_info(&url)
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": info,
    })))
}

/// POST /process/ and /api/process/ - Download the media into the store
pub async fn process_video(
    State(state): State<AppState>,
    Payload(payload): Payload<ProcessRequest>,
) -> Result<Json<Value>> {
    let url = required_url(payload.url.as_deref())?;
    let quality = payload.quality()?;
    let remove_watermark = payload.remove_watermark.unwrap_or(true);
    tracing::info!(url = %url, %quality, remove_watermark, "processing download");

    let retry = &state.config.server.upstream_retry;
    let link = with_retry(retry, || {
        state.source.media_link(&url, quality, remove_watermark)
    })
    .await?;
    let bytes = with_retry(retry, || state.source.fetch_media(&link)).await?;
    let filename = state.store.save(&bytes, link.format).await?;

    Ok(Json(json!({
        "status": "success",
        "message": PROCESS_SUCCESS,
        "download_url": format!("/download/{filename}"),
    })))
}

/// GET /download/:filename - Serve a processed file as an attachment
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let path = state.store.resolve(&filename)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mp3") => MediaFormat::Audio,
        _ => MediaFormat::Video,
    };
    tracing::debug!(file = %filename, bytes = bytes.len(), "serving download");

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
