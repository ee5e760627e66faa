//! Route handlers for the backend server
//!
//! Handlers are organized by domain:
//! - [`media`]: video info, processing and file download
//! - [`system`]: health

use crate::types::{MediaFormat, Quality};
use serde::{Deserialize, Deserializer};

mod media;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use media::*;
pub use system::*;

// ============================================================================
// Request Types (shared across handlers)
// ============================================================================

/// Body of POST /get_video_info/ and /api/video-info/
#[derive(Debug, Default, Deserialize)]
pub struct InfoRequest {
    /// Video page URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of POST /process/ and /api/process/
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    /// Video page URL
    #[serde(default)]
    pub url: Option<String>,

    /// "hd" (default), "sd", "audio" or "mp3"
    #[serde(default)]
    pub quality: Option<String>,

    /// Watermark removal; a JSON bool or the strings "true"/"false" (default: true)
    #[serde(default, deserialize_with = "flexible_bool")]
    pub remove_watermark: Option<bool>,

    /// "mp4"/"video" or "mp3"/"audio"; audio forces audio quality
    #[serde(default)]
    pub format: Option<MediaFormat>,
}

impl ProcessRequest {
    /// Requested quality, with the format taking precedence for audio
    pub fn quality(&self) -> crate::Result<Quality> {
        let quality = match self.quality.as_deref().map(str::trim) {
            None | Some("") => Quality::Hd,
            Some(value) => value.parse().map_err(crate::Error::BadRequest)?,
        };
        Ok(match self.format {
            Some(MediaFormat::Audio) => Quality::Audio,
            _ => quality,
        })
    }
}

/// Form fields arrive as strings, JSON fields as booleans
fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        None => None,
    })
}
