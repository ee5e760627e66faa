//! Core types for tiktok-dl

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Output quality requested from the process endpoint
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// High definition MP4
    #[default]
    Hd,
    /// Standard definition MP4
    Sd,
    /// Audio only (MP3)
    Audio,
}

impl Quality {
    /// Wire value ("hd", "sd", "audio")
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hd => "hd",
            Quality::Sd => "sd",
            Quality::Audio => "audio",
        }
    }

    /// Container format implied by this quality
    pub fn format(&self) -> MediaFormat {
        match self {
            Quality::Audio => MediaFormat::Audio,
            Quality::Hd | Quality::Sd => MediaFormat::Video,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hd" => Ok(Quality::Hd),
            "sd" => Ok(Quality::Sd),
            "audio" | "mp3" => Ok(Quality::Audio),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// Video or audio-only download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// MP4 video
    #[default]
    #[serde(alias = "mp4")]
    Video,
    /// MP3 audio
    #[serde(alias = "mp3")]
    Audio,
}

impl MediaFormat {
    /// File extension, also the form-encoded `format` value ("mp4" / "mp3")
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Video => "mp4",
            MediaFormat::Audio => "mp3",
        }
    }

    /// MIME type of stored files
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Video => "video/mp4",
            MediaFormat::Audio => "audio/mpeg",
        }
    }
}

/// User choices made on the preview before confirming a download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Selected quality (default: hd)
    #[serde(default)]
    pub quality: Quality,

    /// Ask the backend to strip the watermark (default: true)
    #[serde(default = "default_true")]
    pub remove_watermark: bool,

    /// Video or audio-only (default: video)
    #[serde(default)]
    pub format: MediaFormat,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: Quality::Hd,
            remove_watermark: true,
            format: MediaFormat::Video,
        }
    }
}

impl DownloadOptions {
    /// Quality actually sent: the audio format always asks for audio
    pub fn effective_quality(&self) -> Quality {
        match self.format {
            MediaFormat::Audio => Quality::Audio,
            MediaFormat::Video => self.quality,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Body of a process-endpoint call
///
/// Built once when the user confirms and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source video URL
    pub url: String,
    /// Requested quality
    pub quality: Quality,
    /// Watermark removal flag, passed through to the backend
    pub remove_watermark: bool,
}

impl DownloadRequest {
    /// Build a request for `url` from the user's options
    pub fn new(url: impl Into<String>, options: &DownloadOptions) -> Self {
        Self {
            url: url.into(),
            quality: options.effective_quality(),
            remove_watermark: options.remove_watermark,
        }
    }
}

/// Displayable metadata returned by the info endpoint
///
/// Field names on the wire follow the website's script (`thumbnail`, `url`); the
/// longer names are accepted as aliases. Missing or `null` values read as empty / zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    /// Video caption
    #[serde(deserialize_with = "nullable_string")]
    pub title: String,

    /// Author handle
    #[serde(deserialize_with = "nullable_string")]
    pub author: String,

    /// Cover image URL
    #[serde(
        rename = "thumbnail",
        alias = "thumbnail_url",
        deserialize_with = "nullable_string"
    )]
    pub thumbnail_url: String,

    /// Like count
    #[serde(deserialize_with = "lenient_count")]
    pub likes: u64,

    /// Play count
    #[serde(deserialize_with = "lenient_count")]
    pub plays: u64,

    /// Share count
    #[serde(deserialize_with = "lenient_count")]
    pub shares: u64,

    /// URL the process endpoint should be called with
    #[serde(
        rename = "url",
        alias = "canonical_url",
        deserialize_with = "nullable_string"
    )]
    pub canonical_url: String,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Counts arrive as numbers, numeric strings, or `null` depending on the backend
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Int(n)) => n,
        Some(Count::Float(f)) if f.is_finite() && f > 0.0 => f as u64,
        Some(Count::Text(s)) => s.trim().parse().unwrap_or(0),
        Some(Count::Float(_)) | None => 0,
    })
}

/// Lifecycle state of one download attempt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Waiting for the info endpoint
    FetchingInfo,
    /// Preview held, waiting for the user to confirm
    Previewing,
    /// Waiting for the process endpoint
    Processing,
    /// Download location received and handed to navigation
    Succeeded,
    /// Last call failed; a new submission starts over
    Failed,
}

impl OrchestratorState {
    /// A call is in flight; new submissions and confirmations are dropped
    pub fn is_busy(&self) -> bool {
        match self {
            OrchestratorState::FetchingInfo | OrchestratorState::Processing => true,
            OrchestratorState::Idle
            | OrchestratorState::Previewing
            | OrchestratorState::Succeeded
            | OrchestratorState::Failed => false,
        }
    }

    /// Snake-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::FetchingInfo => "fetching_info",
            OrchestratorState::Previewing => "previewing",
            OrchestratorState::Processing => "processing",
            OrchestratorState::Succeeded => "succeeded",
            OrchestratorState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend operation a retry or failure refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Info endpoint call
    FetchInfo,
    /// Process endpoint call
    Process,
}

/// How a notice should be presented
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Failure message
    Error,
    /// Rate-limit wait message; stays until the state changes
    Waiting,
    /// Confirmation message
    Success,
}

/// Event emitted by the orchestrator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// State transition
    StateChanged {
        /// Previous state
        from: OrchestratorState,
        /// New state
        to: OrchestratorState,
    },

    /// Preview is ready to render
    Preview {
        /// Metadata from the info endpoint
        info: VideoInfo,
    },

    /// User-facing message
    Notice {
        /// Presentation style
        level: NoticeLevel,
        /// Message text
        message: String,
        /// Auto-dismiss delay; `None` keeps the notice until replaced
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "crate::config::optional_duration_ms_serde"
        )]
        dismiss_after: Option<Duration>,
    },

    /// A rate-limited call will be repeated
    RetryScheduled {
        /// Operation being retried
        operation: Operation,
        /// Retry number (1-based)
        attempt: u32,
        /// Wait before the retry
        #[serde(with = "crate::config::duration_ms_serde")]
        delay: Duration,
    },

    /// Start the file download by navigating to this URL
    Navigate {
        /// Absolute download URL
        url: String,
    },
}

/// Result of a call that may be dropped by the busy guard
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch<T> {
    /// The call ran to completion
    Done(T),
    /// Another call was in flight; nothing happened
    Busy,
}

impl<T> Dispatch<T> {
    /// True when the call was dropped
    pub fn is_busy(&self) -> bool {
        matches!(self, Dispatch::Busy)
    }

    /// The completed value, if any
    pub fn into_inner(self) -> Option<T> {
        match self {
            Dispatch::Done(value) => Some(value),
            Dispatch::Busy => None,
        }
    }
}

/// Where a submission ended up
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Preview held, waiting for confirmation
    Previewing(VideoInfo),
    /// Chained flow reached the download
    Started {
        /// URL handed to navigation
        download_url: String,
    },
}
