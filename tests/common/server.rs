//! Running backend server on an ephemeral port

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tiktok_dl::api::{self, AppState};
use tiktok_dl::config::{Config, RetryConfig};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::fixtures::StaticSource;

/// Backend server bound to 127.0.0.1 on a free port
pub struct TestServer {
    /// `http://127.0.0.1:<port>`
    pub base_url: String,
    /// Source the server resolves media through
    pub source: Arc<StaticSource>,
    /// Holds the download directory
    pub temp_dir: TempDir,
    shutdown: CancellationToken,
    handle: JoinHandle<tiktok_dl::Result<()>>,
}

impl TestServer {
    /// Start a server; `customize` adjusts the server config before binding
    pub async fn start(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.download_dir = temp_dir.path().join("downloads");
        config.server.upstream_retry = RetryConfig::fixed(0, Duration::ZERO);
        customize(&mut config);

        let source = Arc::new(StaticSource::default());
        let state = AppState::new(source.clone(), Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(api::serve_on(
            listener,
            state,
            shutdown.clone().cancelled_owned(),
        ));

        Self {
            base_url,
            source,
            temp_dir,
            shutdown,
            handle,
        }
    }

    /// Client config pointing at this server, without throttle and with fast retries
    pub fn client_config(&self) -> Config {
        let mut config = Config::default();
        config.backend.base_url = self.base_url.clone();
        config.orchestrator.throttle_delay = Duration::ZERO;
        config.retry = RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        };
        config
    }

    /// Stop the server and wait for it
    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}
