//! Reader configuration

use std::time::Duration;

use uhfrust_core::{constants::APP_START_TIMEOUT_SECS, CatalogMode};
use uhfrust_types::Catalog;

/// Default wait per transport read before the loop checks its other inputs
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for a [`Reader`](crate::Reader)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use uhfrust::{CatalogMode, ReaderConfig};
///
/// let config = ReaderConfig::default()
///     .with_catalog_mode(CatalogMode::Linked)
///     .with_app_start_timeout(Duration::from_millis(500));
/// assert_eq!(config.catalog_mode, CatalogMode::Linked);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// How inventory updates relate to the catalog
    pub catalog_mode: CatalogMode,

    /// Wait for a start-application ack before querying the running stage
    pub app_start_timeout: Duration,

    /// Upper bound on a single transport read
    pub poll_interval: Duration,

    /// Catalog loaded before the first scan
    pub catalog: Option<Catalog>,
}

impl ReaderConfig {
    pub fn with_catalog_mode(mut self, mode: CatalogMode) -> Self {
        self.catalog_mode = mode;
        self
    }

    pub fn with_app_start_timeout(mut self, timeout: Duration) -> Self {
        self.app_start_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Preload a catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            catalog_mode: CatalogMode::default(),
            app_start_timeout: Duration::from_secs(APP_START_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            catalog: None,
        }
    }
}
