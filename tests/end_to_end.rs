//! Orchestrator driving the bundled backend server over real HTTP
//!
//! The server resolves media through an in-memory source, so these tests need no network
//! access beyond loopback.

mod common;

use common::{AUDIO_BYTES, TestServer, VIDEO_BYTES, VIDEO_URL, drain, navigations};
use tiktok_dl::utils::save_download;
use tiktok_dl::{
    DownloadOptions, Event, MediaFormat, Operation, Orchestrator, OrchestratorState,
    RequestEncoding,
};

#[tokio::test]
async fn preview_then_download_saves_the_file() {
    let server = TestServer::start(|_| {}).await;
    let orchestrator = Orchestrator::new(server.client_config()).unwrap();
    let mut rx = orchestrator.subscribe();

    let info = orchestrator
        .fetch_info(VIDEO_URL)
        .await
        .unwrap()
        .into_inner()
        .unwrap();
    assert_eq!(info.title, "Cooking pasta");
    assert_eq!(info.canonical_url, "https://www.tiktok.com/@chef/video/7234567890");
    assert_eq!(orchestrator.state(), OrchestratorState::Previewing);

    let download_url = orchestrator
        .process_download(&DownloadOptions::default())
        .await
        .unwrap()
        .into_inner()
        .unwrap();
    assert!(download_url.starts_with(&format!("{}/download/tiktok_", server.base_url)));
    assert!(download_url.ends_with(".mp4"));
    assert_eq!(orchestrator.state(), OrchestratorState::Succeeded);
    assert_eq!(navigations(&drain(&mut rx)), vec![download_url.clone()]);

    let target = tempfile::tempdir().unwrap();
    let saved = save_download(&reqwest::Client::new(), &download_url, target.path())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&saved).unwrap(), VIDEO_BYTES);
    assert!(
        saved
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("tiktok_") && n.ends_with(".mp4"))
    );

    server.stop().await;
}

#[tokio::test]
async fn form_encoded_audio_download() {
    let server = TestServer::start(|_| {}).await;
    let mut config = server.client_config();
    config.backend.encoding = RequestEncoding::Form;
    config.backend.info_path = "/get_video_info/".to_string();
    config.backend.process_path = "/process/".to_string();
    config.backend.cookie = Some("csrftoken=abc123".to_string());
    let orchestrator = Orchestrator::new(config).unwrap();

    assert!(!orchestrator.fetch_info(VIDEO_URL).await.unwrap().is_busy());
    let download_url = orchestrator
        .process_download(&DownloadOptions {
            format: MediaFormat::Audio,
            ..DownloadOptions::default()
        })
        .await
        .unwrap()
        .into_inner()
        .unwrap();
    assert!(download_url.ends_with(".mp3"));

    let response = reqwest::get(&download_url).await.unwrap();
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(&response.bytes().await.unwrap()[..], AUDIO_BYTES);

    server.stop().await;
}

#[tokio::test]
async fn rapid_submissions_reach_the_server_once() {
    let server = TestServer::start(|_| {}).await;
    let orchestrator = Orchestrator::new(server.client_config()).unwrap();

    let (first, second) = tokio::join!(
        orchestrator.fetch_info(VIDEO_URL),
        orchestrator.fetch_info(VIDEO_URL)
    );

    assert!(!first.unwrap().is_busy());
    assert!(second.unwrap().is_busy());
    assert_eq!(server.source.info_calls(), 1);

    server.stop().await;
}

#[tokio::test]
async fn server_rate_limit_is_retried_then_fails() {
    let server = TestServer::start(|config| {
        config.server.rate_limit.max_requests = 1;
    })
    .await;
    let orchestrator = Orchestrator::new(server.client_config()).unwrap();
    let mut rx = orchestrator.subscribe();

    assert!(!orchestrator.fetch_info(VIDEO_URL).await.unwrap().is_busy());
    let dispatch = orchestrator
        .process_download(&DownloadOptions::default())
        .await
        .unwrap();
    assert!(!dispatch.is_busy());

    // Second download from the same client exceeds the hourly limit
    assert!(!orchestrator.fetch_info(VIDEO_URL).await.unwrap().is_busy());
    let err = orchestrator
        .process_download(&DownloadOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_rate_limited(), "{err:?}");
    assert_eq!(err.user_message(), "Api Limit exceeded. Please wait a moment.");
    assert_eq!(orchestrator.state(), OrchestratorState::Failed);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::RetryScheduled {
            operation: Operation::Process,
            attempt: 1,
            ..
        }
    )));
    assert_eq!(navigations(&events).len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn invalid_url_never_reaches_the_server() {
    let server = TestServer::start(|_| {}).await;
    let orchestrator = Orchestrator::new(server.client_config()).unwrap();

    for input in ["", "   ", "https://example.com/video/1", "www.tiktok.com/@a/video/1"] {
        assert!(orchestrator.fetch_info(input).await.is_err(), "{input:?}");
    }

    assert_eq!(server.source.info_calls(), 0);
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);

    server.stop().await;
}
