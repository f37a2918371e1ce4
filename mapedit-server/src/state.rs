//! Shared handler state.

use std::sync::Arc;

use mapedit_core::{FeatureService, SqliteFeatureStore};
use mapedit_data::OsmImporter;

use crate::error::ApiError;
use crate::style::StyleProxy;

/// Services shared by every request.
///
/// Cloning is cheap; the store opens a fresh SQLite connection per call.
#[derive(Debug, Clone)]
pub struct AppState {
    features: Arc<FeatureService<SqliteFeatureStore>>,
    importer: OsmImporter,
    style: Arc<StyleProxy>,
}

impl AppState {
    /// Bundle the services behind the router.
    #[must_use]
    pub fn new(store: SqliteFeatureStore, importer: OsmImporter, style: StyleProxy) -> Self {
        Self {
            features: Arc::new(FeatureService::new(store)),
            importer,
            style: Arc::new(style),
        }
    }

    pub(crate) const fn importer(&self) -> &OsmImporter {
        &self.importer
    }

    /// Run `op` against the feature service on the blocking pool.
    pub(crate) async fn with_features<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&FeatureService<SqliteFeatureStore>) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let features = Arc::clone(&self.features);
        tokio::task::spawn_blocking(move || op(&features)).await?
    }

    /// Run `op` against the style proxy on the blocking pool.
    pub(crate) async fn with_style<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&StyleProxy) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let style = Arc::clone(&self.style);
        tokio::task::spawn_blocking(move || op(&style)).await?
    }
}
