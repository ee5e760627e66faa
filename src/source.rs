//! Media sources used by the backend server
//!
//! A [`MediaSource`] turns a video page URL into metadata and a direct media link. The
//! bundled [`TikwmSource`] resolves links through the public tikwm API.

use crate::error::{Error, Result};
use crate::types::{MediaFormat, Quality, VideoInfo};
use crate::utils::{clean_url, extract_video_id};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Direct link to a media file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaLink {
    /// Absolute URL of the file
    pub url: String,
    /// What the link points to
    pub format: MediaFormat,
}

/// Resolves video page URLs to metadata and media files
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Metadata for the preview
    async fn video_info(&self, url: &str) -> Result<VideoInfo>;

    /// Direct link for the requested quality
    async fn media_link(&self, url: &str, quality: Quality, remove_watermark: bool)
    -> Result<MediaLink>;

    /// Download the file behind `link`
    async fn fetch_media(&self, link: &MediaLink) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct TikwmResponse {
    #[serde(default = "default_code")]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<TikwmVideo>,
}

fn default_code() -> i64 {
    -1
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TikwmVideo {
    title: Option<String>,
    cover: Option<String>,
    play: Option<String>,
    wmplay: Option<String>,
    hdplay: Option<String>,
    music: Option<String>,
    digg_count: u64,
    play_count: u64,
    share_count: u64,
    author: Option<TikwmAuthor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TikwmAuthor {
    unique_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TikwmVideo {
    fn into_info(self, source_url: &str) -> VideoInfo {
        let handle = self
            .author
            .as_ref()
            .and_then(|a| non_empty(&a.unique_id))
            .unwrap_or("user")
            .to_string();

        VideoInfo {
            title: non_empty(&self.title).unwrap_or("TikTok Video").to_string(),
            author: format!("@{handle}"),
            thumbnail_url: non_empty(&self.cover).unwrap_or_default().to_string(),
            likes: self.digg_count,
            plays: self.play_count,
            shares: self.share_count,
            canonical_url: clean_url(source_url).to_string(),
        }
    }

    /// `hdplay` and `play` are watermark-free; `wmplay` carries the watermark
    fn link_for(&self, quality: Quality, remove_watermark: bool) -> Option<&str> {
        let watermarked = non_empty(&self.wmplay).filter(|_| !remove_watermark);
        match quality {
            Quality::Audio => non_empty(&self.music),
            Quality::Hd => watermarked
                .or_else(|| non_empty(&self.hdplay))
                .or_else(|| non_empty(&self.play)),
            Quality::Sd => watermarked
                .or_else(|| non_empty(&self.play))
                .or_else(|| non_empty(&self.hdplay)),
        }
    }
}

/// [`MediaSource`] backed by the tikwm API
#[derive(Clone, Debug)]
pub struct TikwmSource {
    http: reqwest::Client,
    api_url: Url,
}

impl TikwmSource {
    /// Create a source for the API at `api_url`
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url).map_err(|e| Error::Config {
            message: format!("invalid source API URL {api_url:?}: {e}"),
            key: Some("server.source_api_url".to_string()),
        })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("tiktok-dl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, api_url })
    }

    async fn lookup(&self, url: &str) -> Result<TikwmVideo> {
        tracing::debug!(
            url = %url,
            video_id = ?extract_video_id(url),
            api = %self.api_url,
            "querying media source"
        );
        let response = self
            .http
            .post(self.api_url.clone())
            .form(&[("url", url)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                message: "Media source rate limit reached".to_string(),
            });
        }
        if !status.is_success() {
            return Err(Error::Upstream {
                message: format!("Media source returned HTTP {status}"),
            });
        }

        let body: TikwmResponse = response.json().await?;
        if body.code != 0 {
            return Err(Error::upstream(body.msg, "Media source error"));
        }
        body.data
            .ok_or_else(|| Error::upstream(None, "Media source returned no video data"))
    }

    /// Links may come back relative to the API host
    fn absolute(&self, link: &str) -> String {
        self.api_url
            .join(link)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| link.to_string())
    }
}

#[async_trait]
impl MediaSource for TikwmSource {
    async fn video_info(&self, url: &str) -> Result<VideoInfo> {
        Ok(self.lookup(url).await?.into_info(url))
    }

    async fn media_link(
        &self,
        url: &str,
        quality: Quality,
        remove_watermark: bool,
    ) -> Result<MediaLink> {
        let video = self.lookup(url).await?;
        let link = video
            .link_for(quality, remove_watermark)
            .ok_or_else(|| Error::Upstream {
                message: format!("No {quality} download available for this video"),
            })?;

        Ok(MediaLink {
            url: self.absolute(link),
            format: quality.format(),
        })
    }

    async fn fetch_media(&self, link: &MediaLink) -> Result<Vec<u8>> {
        let response = self.http.get(&link.url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Upstream {
                message: format!("Media download returned HTTP {}", response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VIDEO: &str = "https://www.tiktok.com/@chef/video/7234567890?is_from_webapp=1";

    fn source(server: &MockServer) -> TikwmSource {
        TikwmSource::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    async fn mount_video(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/"))
            .and(body_string_contains("url=https%3A%2F%2Fwww.tiktok.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "success",
                "data": {
                    "title": "Cooking pasta",
                    "cover": "https://cdn.example/cover.jpg",
                    "play": "/video/media/play/1.mp4",
                    "wmplay": "/video/media/wmplay/1.mp4",
                    "hdplay": "/video/media/hdplay/1.mp4",
                    "music": "https://cdn.example/music.mp3",
                    "digg_count": 1500,
                    "play_count": 2300000,
                    "share_count": 12,
                    "author": { "unique_id": "chef" }
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn video_info_maps_api_fields() {
        let server = MockServer::start().await;
        mount_video(&server).await;

        let info = source(&server).video_info(VIDEO).await.unwrap();

        assert_eq!(
            info,
            VideoInfo {
                title: "Cooking pasta".to_string(),
                author: "@chef".to_string(),
                thumbnail_url: "https://cdn.example/cover.jpg".to_string(),
                likes: 1500,
                plays: 2_300_000,
                shares: 12,
                canonical_url: "https://www.tiktok.com/@chef/video/7234567890".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn links_follow_quality_and_watermark_choice() {
        let server = MockServer::start().await;
        mount_video(&server).await;
        let source = source(&server);
        let base = server.uri();

        let hd = source.media_link(VIDEO, Quality::Hd, true).await.unwrap();
        assert_eq!(hd.url, format!("{base}/video/media/hdplay/1.mp4"));
        assert_eq!(hd.format, MediaFormat::Video);

        let sd = source.media_link(VIDEO, Quality::Sd, true).await.unwrap();
        assert_eq!(sd.url, format!("{base}/video/media/play/1.mp4"));

        let marked = source.media_link(VIDEO, Quality::Hd, false).await.unwrap();
        assert_eq!(marked.url, format!("{base}/video/media/wmplay/1.mp4"));

        let audio = source.media_link(VIDEO, Quality::Audio, true).await.unwrap();
        assert_eq!(audio.url, "https://cdn.example/music.mp3");
        assert_eq!(audio.format, MediaFormat::Audio);
    }

    #[tokio::test]
    async fn api_error_code_carries_its_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": -1,
                "msg": "Url parsing is failed! Please check url."
            })))
            .mount(&server)
            .await;

        let err = source(&server).video_info(VIDEO).await.unwrap_err();
        assert_eq!(err.to_string(), "Url parsing is failed! Please check url.");
    }

    #[tokio::test]
    async fn missing_author_and_title_use_placeholders() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": {} })),
            )
            .mount(&server)
            .await;

        let source = source(&server);
        let info = source.video_info(VIDEO).await.unwrap();
        assert_eq!(info.title, "TikTok Video");
        assert_eq!(info.author, "@user");

        let err = source
            .media_link(VIDEO, Quality::Audio, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn fetch_media_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/media/play/1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .mount(&server)
            .await;

        let link = MediaLink {
            url: format!("{}/video/media/play/1.mp4", server.uri()),
            format: MediaFormat::Video,
        };
        assert_eq!(source(&server).fetch_media(&link).await.unwrap(), b"mp4");
    }
}
