//! In-memory media source and sample data

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tiktok_dl::source::{MediaLink, MediaSource};
use tiktok_dl::{MediaFormat, Quality, VideoInfo};

/// Link users paste in the tests
pub const VIDEO_URL: &str = "https://www.tiktok.com/@chef/video/7234567890?is_from_webapp=1";

/// Bytes served for video downloads
pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video";

/// Bytes served for audio downloads
pub const AUDIO_BYTES: &[u8] = b"ID3fake-audio";

/// Media source that answers every URL with the same clip
#[derive(Default)]
pub struct StaticSource {
    /// Number of metadata lookups served
    pub info_calls: AtomicU32,
}

impl StaticSource {
    /// Lookups served so far
    pub fn info_calls(&self) -> u32 {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for StaticSource {
    async fn video_info(&self, url: &str) -> tiktok_dl::Result<VideoInfo> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoInfo {
            title: "Cooking pasta".to_string(),
            author: "@chef".to_string(),
            thumbnail_url: "https://cdn.example/cover.jpg".to_string(),
            likes: 1500,
            plays: 2_300_000,
            shares: 12,
            canonical_url: tiktok_dl::utils::clean_url(url).to_string(),
        })
    }

    async fn media_link(
        &self,
        url: &str,
        quality: Quality,
        _remove_watermark: bool,
    ) -> tiktok_dl::Result<MediaLink> {
        Ok(MediaLink {
            url: format!("{url}#{quality}"),
            format: quality.format(),
        })
    }

    async fn fetch_media(&self, link: &MediaLink) -> tiktok_dl::Result<Vec<u8>> {
        Ok(match link.format {
            MediaFormat::Video => VIDEO_BYTES.to_vec(),
            MediaFormat::Audio => AUDIO_BYTES.to_vec(),
        })
    }
}
