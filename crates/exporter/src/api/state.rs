use std::sync::Arc;

use error_stack::Report;

use super::pool::ExporterPool;
use crate::config::ConfigError;
use crate::config::ConfigStore;

/// Shared state of the HTTP handlers
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub pool: ExporterPool,
    /// Prefix of every exposed metric name
    pub namespace: String,
    pub metrics_path: String,
}

impl AppState {
    /// Reload the device file and drop every cached exporter.
    ///
    /// On failure the previous configuration and exporters stay in place.
    pub fn reload(&self) -> Result<(), Report<ConfigError>> {
        self.store.reload()?;
        self.pool.clear();
        Ok(())
    }
}
