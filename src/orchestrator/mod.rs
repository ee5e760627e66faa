//! Download request orchestration
//!
//! [`Orchestrator`] owns the lifecycle of one download attempt:
//!
//! ```text
//! Idle ──submit──▶ FetchingInfo ──▶ Previewing ──confirm──▶ Processing ──▶ Succeeded
//!                       │                                       │
//!                       └───────────────▶ Failed ◀──────────────┘
//! ```
//!
//! Rate-limited calls stay in their busy state and are retried with backoff. While a call is
//! in flight every other submission or confirmation is dropped, so at most one request is
//! ever outstanding. Nothing here touches a UI: progress is published as [`Event`]s for a
//! presentation layer to render.

use crate::client::{BackendClient, HttpBackend, PROCESS_FAILURE};
use crate::config::{Config, FlowPolicy};
use crate::error::{Error, Result};
use crate::retry::retry_if;
use crate::types::{
    Dispatch, DownloadOptions, DownloadRequest, Event, NoticeLevel, Operation, OrchestratorState,
    Outcome, VideoInfo,
};
use crate::validation::validate_url;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;


/// Persistent notice shown while a rate-limited call waits for its retry
pub const RATE_LIMIT_NOTICE: &str = "API limit reached. Please wait a moment...";

/// Transient notice shown once navigation to the download has been triggered
pub const DOWNLOAD_STARTED_NOTICE: &str = "Download started!";

/// Mutable part of the orchestrator, guarded by a single lock
#[derive(Debug, Default)]
struct Session {
    state: OrchestratorState,
    /// URL of the last accepted submission
    submitted_url: Option<String>,
    /// Preview from the last successful info call
    preview: Option<VideoInfo>,
}

/// Drives the info → preview → process flow against a backend
pub struct Orchestrator {
    backend: Arc<dyn BackendClient>,
    config: Arc<Config>,
    session: Mutex<Session>,
    event_tx: broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Create an orchestrator talking to the HTTP backend described by `config.backend`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = HttpBackend::new(&config.backend)?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// Create an orchestrator over any [`BackendClient`]
    pub fn with_backend(config: Config, backend: Arc<dyn BackendClient>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.orchestrator.event_capacity);
        Ok(Self {
            backend,
            config: Arc::new(config),
            session: Mutex::new(Session::default()),
            event_tx,
        })
    }

    /// Subscribe to state transitions, previews, notices and navigation requests
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> OrchestratorState {
        self.lock_session().state
    }

    /// Preview held from the last successful info call
    pub fn preview(&self) -> Option<VideoInfo> {
        self.lock_session().preview.clone()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit a URL and follow the configured [`FlowPolicy`]
    ///
    /// With [`FlowPolicy::TwoStep`] this stops at the preview; with
    /// [`FlowPolicy::Chained`] it continues straight into [`process_download`](Self::process_download)
    /// using `options`.
    pub async fn submit(&self, raw_url: &str, options: &DownloadOptions) -> Result<Dispatch<Outcome>> {
        let info = match self.fetch_info(raw_url).await? {
            Dispatch::Done(info) => info,
            Dispatch::Busy => return Ok(Dispatch::Busy),
        };

        match self.config.orchestrator.flow {
            FlowPolicy::TwoStep => Ok(Dispatch::Done(Outcome::Previewing(info))),
            FlowPolicy::Chained => Ok(match self.process_download(options).await? {
                Dispatch::Done(download_url) => Dispatch::Done(Outcome::Started { download_url }),
                Dispatch::Busy => Dispatch::Busy,
            }),
        }
    }

    /// Validate `raw_url` and fetch its preview
    ///
    /// Returns [`Dispatch::Busy`] without touching the network when another call is in
    /// flight. Invalid input is reported as [`Error::Validation`] and leaves the state
    /// unchanged. Any backend failure moves the orchestrator to
    /// [`OrchestratorState::Failed`].
    pub async fn fetch_info(&self, raw_url: &str) -> Result<Dispatch<VideoInfo>> {
        let url = {
            let mut session = self.lock_session();
            if session.state.is_busy() {
                tracing::debug!(state = %session.state, "submission dropped, request in flight");
                return Ok(Dispatch::Busy);
            }

            let url = match validate_url(raw_url) {
                Ok(url) => url,
                Err(e) => {
                    drop(session);
                    tracing::debug!(error = %e, "submission rejected");
                    self.notify_transient(NoticeLevel::Error, e.to_string());
                    return Err(e.into());
                }
            };

            session.submitted_url = Some(url.clone());
            session.preview = None;
            self.transition(session, OrchestratorState::FetchingInfo);
            url
        };
        let in_flight = InFlight::new(self, Operation::FetchInfo);

        tracing::info!(url = %url, "fetching video info");
        let result = self
            .call_backend(Operation::FetchInfo, || self.backend.video_info(&url))
            .await;
        in_flight.disarm();

        match result {
            Ok(info) => {
                let mut session = self.lock_session();
                session.preview = Some(info.clone());
                self.transition(session, OrchestratorState::Previewing);
                tracing::info!(url = %url, title = %info.title, "preview ready");
                self.emit(Event::Preview { info: info.clone() });
                Ok(Dispatch::Done(info))
            }
            Err(e) => Err(self.fail(Operation::FetchInfo, e)),
        }
    }

    /// Ask the backend to process the previewed video and trigger navigation to the file
    ///
    /// Requires a preview ([`Error::NoPreview`] otherwise, without a network call). On
    /// success exactly one [`Event::Navigate`] is emitted with the absolute download URL,
    /// which is also returned.
    pub async fn process_download(&self, options: &DownloadOptions) -> Result<Dispatch<String>> {
        let request = {
            let session = self.lock_session();
            if session.state.is_busy() {
                tracing::debug!(state = %session.state, "confirmation dropped, request in flight");
                return Ok(Dispatch::Busy);
            }

            let Some(preview) = session.preview.as_ref() else {
                drop(session);
                let err = Error::NoPreview;
                self.notify_transient(NoticeLevel::Error, err.user_message());
                return Err(err);
            };

            let url = if preview.canonical_url.trim().is_empty() {
                session.submitted_url.clone().unwrap_or_default()
            } else {
                preview.canonical_url.trim().to_string()
            };
            let request = DownloadRequest::new(url, options);
            self.transition(session, OrchestratorState::Processing);
            request
        };
        let in_flight = InFlight::new(self, Operation::Process);

        tracing::info!(
            url = %request.url,
            quality = %request.quality,
            remove_watermark = request.remove_watermark,
            "processing download"
        );
        let result = self
            .call_backend(Operation::Process, || self.backend.process(&request))
            .await
            .and_then(|location| {
                if location.trim().is_empty() {
                    Err(Error::upstream(None, PROCESS_FAILURE))
                } else {
                    Ok(self.backend.resolve_location(location.trim()))
                }
            });
        in_flight.disarm();

        match result {
            Ok(download_url) => {
                self.transition(self.lock_session(), OrchestratorState::Succeeded);
                tracing::info!(download_url = %download_url, "download ready, navigating");
                self.emit(Event::Navigate {
                    url: download_url.clone(),
                });
                self.notify_transient(NoticeLevel::Success, DOWNLOAD_STARTED_NOTICE.to_string());
                Ok(Dispatch::Done(download_url))
            }
            Err(e) => Err(self.fail(Operation::Process, e)),
        }
    }

    /// Run one backend call with throttle, timeout, rate-limit classification and retry
    async fn call_backend<T, F, Fut>(&self, operation: Operation, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let throttle = self.config.orchestrator.throttle_delay;
        let timeout = self.config.backend.request_timeout;
        let markers = &self.config.orchestrator.rate_limit_markers;

        retry_if(
            &self.config.retry,
            Error::is_rate_limited,
            |e, attempt, delay| {
                tracing::warn!(
                    ?operation,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "upstream rate limit hit"
                );
                self.emit(Event::Notice {
                    level: NoticeLevel::Waiting,
                    message: RATE_LIMIT_NOTICE.to_string(),
                    dismiss_after: None,
                });
                self.emit(Event::RetryScheduled {
                    operation,
                    attempt,
                    delay,
                });
            },
            || {
                let fut = call();
                async move {
                    if !throttle.is_zero() {
                        tokio::time::sleep(throttle).await;
                    }
                    let result = match tokio::time::timeout(timeout, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout(timeout)),
                    };
                    result.map_err(|e| e.classify_rate_limit(markers))
                }
            },
        )
        .await
    }

    fn fail(&self, operation: Operation, error: Error) -> Error {
        self.transition(self.lock_session(), OrchestratorState::Failed);
        tracing::warn!(?operation, error = %error, "backend call failed");
        self.notify_transient(NoticeLevel::Error, error.user_message());
        error
    }

    /// Apply a state change while holding the lock, then publish it
    fn transition(&self, mut session: MutexGuard<'_, Session>, to: OrchestratorState) {
        let from = session.state;
        session.state = to;
        drop(session);

        tracing::debug!(%from, %to, "state changed");
        self.emit(Event::StateChanged { from, to });
    }

    fn notify_transient(&self, level: NoticeLevel, message: String) {
        self.emit(Event::Notice {
            level,
            message,
            dismiss_after: Some(self.config.orchestrator.notice_dismiss_after),
        });
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Marks a backend call in flight
///
/// Dropped while still armed, the caller abandoned the future mid-call and the busy state
/// is released as [`OrchestratorState::Failed`].
struct InFlight<'a> {
    orchestrator: &'a Orchestrator,
    operation: Operation,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(orchestrator: &'a Orchestrator, operation: Operation) -> Self {
        Self {
            orchestrator,
            operation,
            armed: true,
        }
    }

    /// The call finished; the caller applies the resulting transition itself
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let session = self.orchestrator.lock_session();
        if session.state.is_busy() {
            tracing::warn!(operation = ?self.operation, "backend call cancelled");
            self.orchestrator.transition(session, OrchestratorState::Failed);
        }
    }
}
