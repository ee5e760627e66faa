use super::*;
use crate::Config;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::source::{MediaLink, MediaSource};
use crate::types::{MediaFormat, Quality, VideoInfo};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


/// In-memory media source; fails the first `failures` calls with `failure`
struct FakeSource {
    failures: AtomicU32,
    failure: fn() -> Error,
    calls: AtomicU32,
    requested: Mutex<Vec<(Quality, bool)>>,
}

impl FakeSource {
    fn new() -> Self {
        Self::failing(0, || Error::Other("unused".to_string()))
    }

    fn failing(failures: u32, failure: fn() -> Error) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            failure,
            calls: AtomicU32::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn check(&self) -> crate::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err((self.failure)());
        }
        Ok(())
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn video_info(&self, url: &str) -> crate::Result<VideoInfo> {
        self.check()?;
        Ok(VideoInfo {
            title: "Cooking pasta".to_string(),
            author: "@chef".to_string(),
            thumbnail_url: "https://cdn.example/cover.jpg".to_string(),
            likes: 1500,
            plays: 2_300_000,
            shares: 12,
            canonical_url: url.to_string(),
        })
    }

    async fn media_link(
        &self,
        url: &str,
        quality: Quality,
        remove_watermark: bool,
    ) -> crate::Result<MediaLink> {
        self.check()?;
        self.requested.lock().unwrap().push((quality, remove_watermark));
        Ok(MediaLink {
            url: format!("{url}/media"),
            format: quality.format(),
        })
    }

    async fn fetch_media(&self, link: &MediaLink) -> crate::Result<Vec<u8>> {
        Ok(match link.format {
            MediaFormat::Video => b"mp4-bytes".to_vec(),
            MediaFormat::Audio => b"mp3-bytes".to_vec(),
        })
    }
}

const VIDEO_URL: &str = "https://www.tiktok.com/@chef/video/7234567890";

fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.download_dir = temp.path().join("downloads");
    config.server.upstream_retry = RetryConfig::fixed(2, Duration::from_millis(1));
    config
}

fn test_state(source: Arc<FakeSource>, config: Config) -> AppState {
    AppState::new(source, Arc::new(config))
}

fn client_addr() -> SocketAddr {
    "192.0.2.10:40000".parse().unwrap()
}

fn json_post(uri: &str, body: Value) -> Request {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .extension(ConnectInfo(client_addr()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_post(uri: &str, body: &str) -> Request {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .extension(ConnectInfo(client_addr()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request {
    Request::builder()
        .method("GET")
        .uri(uri)
        .extension(ConnectInfo(client_addr()))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_server_serves_and_shuts_down() {
    let temp = TempDir::new().unwrap();
    let state = test_state(Arc::new(FakeSource::new()), test_config(&temp));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_on(listener, state, shutdown.clone().cancelled_owned()));

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_server_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.server.cleanup_interval = Duration::ZERO;
    let state = test_state(Arc::new(FakeSource::new()), config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        serve_on(listener, state, std::future::pending()),
    )
    .await
    .expect("server started despite invalid config");

    match result {
        Err(Error::Config { key, .. }) => {
            assert_eq!(key.as_deref(), Some("server.cleanup_interval"))
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cors_enabled() {
    let temp = TempDir::new().unwrap();
    let app = create_router(test_state(Arc::new(FakeSource::new()), test_config(&temp)));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/video-info/")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .extension(ConnectInfo(client_addr()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_rate_limit_on_process_paths() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.server.rate_limit.max_requests = 2;
    let app = create_router(test_state(Arc::new(FakeSource::new()), config));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_post("/process/", serde_json::json!({ "url": VIDEO_URL })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(json_post("/api/process/", serde_json::json!({ "url": VIDEO_URL })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], rate_limit::RATE_LIMIT_MESSAGE);

    // Info lookups are not limited
    let response = app
        .oneshot(json_post("/api/video-info/", serde_json::json!({ "url": VIDEO_URL })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.server.rate_limit.enabled = false;
    config.server.rate_limit.max_requests = 0;
    let app = create_router(test_state(Arc::new(FakeSource::new()), config));

    let response = app
        .oneshot(json_post("/process/", serde_json::json!({ "url": VIDEO_URL })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
