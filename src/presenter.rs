//! Text rendering of orchestrator events
//!
//! The orchestrator never formats anything for display; this module turns its [`Event`]s
//! into lines of text and tracks which notice is currently visible.

use crate::error::Result;
use crate::types::{Event, MediaFormat, NoticeLevel, Operation, OrchestratorState, VideoInfo};
use crate::utils::format_count;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Label of the submit button for the selected format
pub fn submit_label(format: MediaFormat) -> &'static str {
    match format {
        MediaFormat::Video => "Download Video",
        MediaFormat::Audio => "Download Audio",
    }
}

/// Render the preview card
///
/// ```
/// use tiktok_dl::presenter::render_preview;
/// use tiktok_dl::VideoInfo;
///
/// let info = VideoInfo {
///     title: "Cooking pasta".into(),
///     author: "@chef".into(),
///     likes: 1500,
///     ..Default::default()
/// };
/// let card = render_preview(&info);
/// assert!(card.contains("Cooking pasta"));
/// assert!(card.contains("1.5K likes"));
/// ```
pub fn render_preview(info: &VideoInfo) -> String {
    let title = if info.title.trim().is_empty() {
        "Untitled video"
    } else {
        info.title.trim()
    };

    let mut card = format!("{title}\n");
    if !info.author.trim().is_empty() {
        card.push_str(&format!("by {}\n", info.author.trim()));
    }
    card.push_str(&format!(
        "{} likes · {} plays · {} shares",
        format_count(Some(info.likes)),
        format_count(Some(info.plays)),
        format_count(Some(info.shares)),
    ));
    if !info.thumbnail_url.trim().is_empty() {
        card.push_str(&format!("\ncover: {}", info.thumbnail_url.trim()));
    }
    card
}

/// Render one event as a line of text, or `None` for events with nothing to show
pub fn render_event(event: &Event) -> Option<String> {
    match event {
        Event::StateChanged { to, .. } => match to {
            OrchestratorState::FetchingInfo => Some("Fetching video info...".to_string()),
            OrchestratorState::Processing => Some("Processing download...".to_string()),
            _ => None,
        },
        Event::Preview { info } => Some(render_preview(info)),
        Event::Notice { level, message, .. } => {
            let tag = match level {
                NoticeLevel::Error => "error",
                NoticeLevel::Waiting => "waiting",
                NoticeLevel::Success => "ok",
            };
            Some(format!("[{tag}] {message}"))
        }
        Event::RetryScheduled {
            operation,
            attempt,
            delay,
        } => {
            let what = match operation {
                Operation::FetchInfo => "video info",
                Operation::Process => "download",
            };
            Some(format!(
                "Retrying {what} in {:.1}s (retry {attempt})",
                delay.as_secs_f64()
            ))
        }
        Event::Navigate { url } => Some(format!("Download ready: {url}")),
    }
}

/// A notice currently on screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Presentation style
    pub level: NoticeLevel,
    /// Message text
    pub message: String,
    /// When a transient notice disappears; `None` for persistent ones
    pub expires_at: Option<Instant>,
}

/// Tracks the single visible notice
///
/// A new notice replaces the previous one. Transient notices expire after their dismiss
/// delay. The rate-limit wait notice has no delay and is cleared by the next state change
/// instead.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the board from an event observed at `now`
    pub fn apply(&mut self, event: &Event, now: Instant) {
        match event {
            Event::Notice {
                level,
                message,
                dismiss_after,
            } => {
                self.current = Some(Notice {
                    level: *level,
                    message: message.clone(),
                    expires_at: dismiss_after.map(|d| now + d),
                });
            }
            Event::StateChanged { .. } => {
                if self
                    .current
                    .as_ref()
                    .is_some_and(|n| n.level == NoticeLevel::Waiting)
                {
                    self.current = None;
                }
            }
            _ => {}
        }
    }

    /// Notice visible at `now`
    pub fn visible(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| n.expires_at.is_none_or(|at| now < at))
    }

    /// Time left before the visible notice is dismissed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.visible(now)?
            .expires_at
            .map(|at| at.saturating_duration_since(now))
    }
}

/// Write every event from `events` to `out` until the orchestrator is dropped
///
/// Lagging behind the channel skips the missed events with a warning.
pub async fn render_events<W: Write>(
    mut events: broadcast::Receiver<Event>,
    mut out: W,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render_event(&event) {
                    writeln!(out, "{line}")?;
                    out.flush()?;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "presenter fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
