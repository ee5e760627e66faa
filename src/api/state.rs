//! Application state for the API server

use crate::Config;
use crate::api::store::MediaStore;
use crate::source::MediaSource;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the media source, the download directory and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Resolves video URLs to metadata and media links
    pub source: Arc<dyn MediaSource>,

    /// Directory processed downloads are written to and served from
    pub store: Arc<MediaStore>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState with a store rooted at `config.server.download_dir`
    pub fn new(source: Arc<dyn MediaSource>, config: Arc<Config>) -> Self {
        let store = Arc::new(MediaStore::new(config.server.download_dir.clone()));
        Self {
            source,
            store,
            config,
        }
    }
}
