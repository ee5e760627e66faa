//! Backend client for the info and process endpoints
//!
//! [`BackendClient`] is the narrow seam the orchestrator talks through; [`HttpBackend`] is
//! the reqwest implementation used against a real backend.

use crate::config::{BackendConfig, RequestEncoding};
use crate::error::{Error, Result};
use crate::types::{DownloadRequest, VideoInfo};
use crate::utils::{CSRF_HEADER, csrf_token_from_cookies};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

/// Fallback message when the info endpoint fails without saying why
pub const INFO_FAILURE: &str = "Failed to fetch video information";

/// Fallback message when the process endpoint fails without saying why
pub const PROCESS_FAILURE: &str = "Download failed";

/// Fallback message for HTTP 429 without a body
const TOO_MANY_REQUESTS: &str = "Too many requests. Please wait a moment.";

/// Calls the two backend endpoints
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Resolve `url` to displayable metadata
    async fn video_info(&self, url: &str) -> Result<VideoInfo>;

    /// Process a download and return the location the file can be fetched from
    async fn process(&self, request: &DownloadRequest) -> Result<String>;

    /// Turn a (possibly relative) download location into an absolute URL
    fn resolve_location(&self, location: &str) -> String {
        location.to_string()
    }
}

/// `{status, message?, data?, download_url?, ...}` as returned by both endpoints
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Envelope {
    fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// reqwest-backed [`BackendClient`]
#[derive(Clone, Debug)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    info_url: Url,
    process_url: Url,
    encoding: RequestEncoding,
    cookie: Option<String>,
    csrf_token: String,
}

impl HttpBackend {
    /// Build a client from configuration
    ///
    /// The endpoint paths are resolved against `base_url`. The anti-forgery token is read
    /// once from the configured cookie header; an absent cookie yields an empty token.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let parse = |value: &str, key: &str| -> Result<Url> {
            Url::parse(&config.base_url)
                .and_then(|base| base.join(value))
                .map_err(|e| Error::Config {
                    message: format!("invalid backend URL {value:?}: {e}"),
                    key: Some(key.to_string()),
                })
        };

        let base_url = parse("", "backend.base_url")?;
        let info_url = parse(&config.info_path, "backend.info_path")?;
        let process_url = parse(&config.process_path, "backend.process_path")?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("tiktok-dl/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        let cookie = config.cookie.clone().filter(|c| !c.trim().is_empty());
        let csrf_token = csrf_token_from_cookies(cookie.as_deref().unwrap_or_default());

        Ok(Self {
            http,
            base_url,
            info_url,
            process_url,
            encoding: config.encoding,
            cookie,
            csrf_token,
        })
    }

    /// Anti-forgery token echoed in every request (empty when no cookie is configured)
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    fn post(&self, url: &Url) -> RequestBuilder {
        let request = self
            .http
            .post(url.clone())
            .header(CSRF_HEADER, &self.csrf_token);
        match &self.cookie {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Envelope> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str::<Envelope>(&body);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = envelope.ok().and_then(|e| e.message);
            return Err(Error::RateLimited {
                message: message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| TOO_MANY_REQUESTS.to_string()),
            });
        }

        match envelope {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(Error::Upstream {
                message: format!("Backend returned HTTP {status}"),
            }),
            Err(e) => Err(Error::Serialization(e)),
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn video_info(&self, url: &str) -> Result<VideoInfo> {
        let request = self.post(&self.info_url);
        let request = match self.encoding {
            RequestEncoding::Json => request.json(&json!({ "url": url })),
            RequestEncoding::Form => request.form(&[("url", url)]),
        };

        tracing::debug!(url = %url, endpoint = %self.info_url, "requesting video info");
        let envelope = self.send(request).await?;
        if !envelope.is_success() {
            return Err(Error::upstream(envelope.message, INFO_FAILURE));
        }

        // One backend variant nests the metadata under `data`, another returns it flat
        let data = match envelope.data {
            Some(Value::Object(data)) => Value::Object(data),
            _ => Value::Object(envelope.rest),
        };
        Ok(serde_json::from_value(data)?)
    }

    async fn process(&self, request: &DownloadRequest) -> Result<String> {
        let builder = self.post(&self.process_url);
        let builder = match self.encoding {
            RequestEncoding::Json => builder.json(request),
            RequestEncoding::Form => {
                let remove_watermark = if request.remove_watermark { "true" } else { "false" };
                builder.form(&[
                    ("url", request.url.as_str()),
                    ("quality", request.quality.as_str()),
                    ("format", request.quality.format().extension()),
                    ("remove_watermark", remove_watermark),
                ])
            }
        };

        tracing::debug!(
            url = %request.url,
            quality = %request.quality,
            remove_watermark = request.remove_watermark,
            endpoint = %self.process_url,
            "requesting download"
        );
        let envelope = self.send(builder).await?;
        if !envelope.is_success() {
            return Err(Error::upstream(envelope.message, PROCESS_FAILURE));
        }

        match envelope.download_url {
            Some(location) if !location.trim().is_empty() => Ok(location),
            _ => Err(Error::upstream(None, PROCESS_FAILURE)),
        }
    }

    fn resolve_location(&self, location: &str) -> String {
        self.base_url
            .join(location)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| location.to_string())
    }
}
