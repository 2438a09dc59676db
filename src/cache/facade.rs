//! Cache Facade Module
//!
//! The one entry point the rest of the application talks to: a data store
//! for backing records, a view store for rendered output, the options, and
//! the global on/off switch.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    generate_key, CacheBackend, CacheKey, CacheOptions, CacheStats, CacheStatus,
    ContentCategory, FlatFileStore, InvalidationQuery, MemoryStore, DEFAULT_DOC_EXPIRES_MS,
    DEFAULT_MEMORY_EXPIRES_MS, MEMORY_CACHE_TYPE, STATUS_OPTION,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Value type held by the data cache.
pub type DataValue = Value;

pub type DataBackend = Arc<dyn CacheBackend<DataValue>>;
pub type ViewBackend = Arc<dyn CacheBackend<String>>;

// == Clear Outcome ==
/// What happened to one store during [`CacheFacade::clear_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    /// Skipped because a `prevent_clear_*_cache_on_start` flag is set
    Prevented,
}

impl fmt::Display for ClearOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearOutcome::Cleared => f.write_str("cleared"),
            ClearOutcome::Prevented => f.write_str("prevented"),
        }
    }
}

// == Clear Report ==
/// Per-store results of a fan-out clear. Both sides are always present.
#[derive(Debug)]
pub struct ClearReport {
    pub data: Result<ClearOutcome>,
    pub view: Result<ClearOutcome>,
}

impl ClearReport {
    pub fn is_ok(&self) -> bool {
        self.data.is_ok() && self.view.is_ok()
    }
}

impl fmt::Display for ClearReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(r: &Result<ClearOutcome>) -> String {
            match r {
                Ok(outcome) => outcome.to_string(),
                Err(err) => err.to_string(),
            }
        }
        write!(f, "data: {}, view: {}", side(&self.data), side(&self.view))
    }
}

// == Facade Stats ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeStats {
    pub data: CacheStats,
    pub view: CacheStats,
}

// == Cache Facade ==
/// Data cache + view cache + options + status.
///
/// Shared as `Arc<CacheFacade>`; every method takes `&self`.
pub struct CacheFacade {
    data: DataBackend,
    view: ViewBackend,
    options: RwLock<CacheOptions>,
    status: RwLock<CacheStatus>,
}

impl fmt::Debug for CacheFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFacade")
            .field("data", &self.data.cache_type())
            .field("view", &self.view.cache_type())
            .finish_non_exhaustive()
    }
}

impl CacheFacade {
    // == Constructors ==
    /// Builds a facade with in-memory data and view stores, merging
    /// `overrides` onto the default options.
    ///
    /// A `status` override sets the initial global status.
    pub fn new(overrides: &Map<String, Value>) -> Result<Self> {
        let options = CacheOptions::with_overrides(overrides)?;
        let data = memory_data_store(&options);
        let view: ViewBackend = Arc::new(MemoryStore::<String>::new(
            MEMORY_CACHE_TYPE,
            DEFAULT_DOC_EXPIRES_MS,
        ));
        let mut facade = Self::with_backends(options, data, view);
        if let Some(status) = overrides.get(STATUS_OPTION) {
            *facade.status.get_mut() = CacheStatus::from(status);
        }
        Ok(facade)
    }

    /// Builds a facade around caller-supplied stores.
    ///
    /// `dataCacheType` and `viewCacheType` are set from the stores, so the
    /// options always name the backends actually serving requests.
    pub fn with_backends(mut options: CacheOptions, data: DataBackend, view: ViewBackend) -> Self {
        pin_backend_types(&mut options, &data, &view);
        Self {
            data,
            view,
            options: RwLock::new(options),
            status: RwLock::new(CacheStatus::Active),
        }
    }

    /// Builds the facade described by the process configuration.
    ///
    /// The view store is flat-file backed when `view_cache_dir` is set.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let options = CacheOptions::with_overrides(&config.cache_options)?;
        let data = memory_data_store(&options);
        data.set_expires(config.data_cache_expires_ms).await?;

        let view: ViewBackend = match &config.view_cache_dir {
            Some(dir) => Arc::new(FlatFileStore::open(dir, config.view_cache_expires_ms).await?),
            None => Arc::new(MemoryStore::<String>::new(
                MEMORY_CACHE_TYPE,
                config.view_cache_expires_ms,
            )),
        };

        let status = match config.cache_options.get(STATUS_OPTION) {
            Some(status) => CacheStatus::from(status),
            None => CacheStatus::from(config.cache_status.as_str()),
        };
        let facade = Self::with_backends(options, data, view);
        facade.set_status(status).await;
        Ok(facade)
    }

    // == Lifecycle ==
    /// Start-up hook: clears both stores unless a prevent flag says not to.
    pub async fn init(&self) -> Result<ClearReport> {
        let report = self.clear_all().await?;
        info!(%report, "cache initialised");
        Ok(report)
    }

    // == Options ==
    pub async fn options(&self) -> CacheOptions {
        self.options.read().await.clone()
    }

    /// Shallow right-biased merge of `overrides` into the current options.
    ///
    /// Backend types cannot be switched at runtime and keep naming the
    /// stores in use. A `status` key goes to [`set_status`](Self::set_status).
    pub async fn set_options(&self, overrides: &Map<String, Value>) -> Result<CacheOptions> {
        let merged = {
            let mut options = self.options.write().await;
            options.merge(overrides)?;
            pin_backend_types(&mut options, &self.data, &self.view);
            options.clone()
        };
        if let Some(status) = overrides.get(STATUS_OPTION) {
            self.set_status(status).await;
        }
        debug!(keys = overrides.len(), "cache options updated");
        Ok(merged)
    }

    // == Status ==
    /// Sets the global status; anything but `"active"`/`true` disables.
    pub async fn set_status(&self, status: impl Into<CacheStatus>) {
        let status = status.into();
        *self.status.write().await = status;
        info!(%status, "cache status changed");
    }

    pub async fn get_status(&self) -> CacheStatus {
        *self.status.read().await
    }

    /// Global status and data cache status are both active.
    pub async fn data_enabled(&self) -> bool {
        self.get_status().await.is_active()
            && self.options.read().await.data_cache_status.is_active()
    }

    /// Global status and view cache status are both active.
    pub async fn view_enabled(&self) -> bool {
        self.get_status().await.is_active()
            && self.options.read().await.view_cache_status.is_active()
    }

    // == Keys ==
    pub fn generate_key(&self, cache_type: &str, raw: &str) -> CacheKey {
        generate_key(cache_type, raw)
    }

    pub fn data_key(&self, raw: &str) -> CacheKey {
        generate_key(self.data.cache_type(), raw)
    }

    pub fn view_key(&self, url: &str) -> CacheKey {
        generate_key(self.view.cache_type(), url)
    }

    pub fn data(&self) -> &DataBackend {
        &self.data
    }

    pub fn view(&self) -> &ViewBackend {
        &self.view
    }

    // == Data Cache ==
    /// Looks up a data record; a disabled cache always misses.
    pub async fn get_data(&self, key: &CacheKey) -> Result<Option<DataValue>> {
        if !self.data_enabled().await {
            return Ok(None);
        }
        self.data.get(key.as_str()).await
    }

    /// Stores a data record with the category's TTL.
    ///
    /// Returns the applied TTL, or `None` when the data cache is disabled.
    pub async fn set_data(
        &self,
        category: Option<ContentCategory>,
        key: &CacheKey,
        value: DataValue,
    ) -> Result<Option<u64>> {
        if !self.data_enabled().await {
            return Ok(None);
        }
        let ttl = match category {
            Some(category) => Some(self.options.read().await.feature(category).doc_expires_ms),
            None => None,
        };
        self.data.set(key.as_str(), value, ttl).await.map(Some)
    }

    pub async fn invalidate_data(&self, query: &InvalidationQuery) -> Result<usize> {
        self.data.del(query).await
    }

    // == View Cache ==
    /// Looks up the rendered view for `url`; a disabled cache always misses.
    pub async fn get_view(&self, url: &str) -> Result<Option<String>> {
        if !self.view_enabled().await {
            return Ok(None);
        }
        self.view.get(self.view_key(url).as_str()).await
    }

    /// Stores the rendered view for `url`.
    ///
    /// The TTL comes from the category whose routes match `url`, falling back
    /// to the view store default.
    pub async fn set_view(&self, url: &str, body: String) -> Result<Option<u64>> {
        if !self.view_enabled().await {
            return Ok(None);
        }
        let ttl = self.options.read().await.expires_for_route(url);
        self.view
            .set(self.view_key(url).as_str(), body, ttl)
            .await
            .map(Some)
    }

    pub async fn invalidate_views(&self, query: &InvalidationQuery) -> Result<usize> {
        self.view.del(query).await
    }

    // == Clear ==
    /// Clears both stores concurrently and waits for both.
    ///
    /// A failing store does not stop the other one; the failure is reported
    /// as `ClearFailed` carrying both outcomes.
    pub async fn clear_all(&self) -> Result<ClearReport> {
        let (prevent_data, prevent_view) = {
            let options = self.options.read().await;
            (
                options.prevent_clear_data_cache_on_start,
                options.prevent_clear_view_cache_on_start,
            )
        };

        let (data, view) = tokio::join!(
            clear_store("data", self.data.as_ref(), prevent_data),
            clear_store("view", self.view.as_ref(), prevent_view),
        );

        let report = ClearReport { data, view };
        if report.is_ok() {
            Ok(report)
        } else {
            warn!(%report, "cache clear failed");
            Err(CacheError::ClearFailed(Box::new(report)))
        }
    }

    // == Maintenance ==
    /// Drops expired entries from both stores; returns how many went.
    pub async fn purge_expired(&self) -> Result<usize> {
        let (data, view) = tokio::join!(self.data.purge_expired(), self.view.purge_expired());
        Ok(data? + view?)
    }

    pub async fn stats(&self) -> Result<FacadeStats> {
        let (data, view) = tokio::join!(self.data.stats(), self.view.stats());
        Ok(FacadeStats {
            data: data?,
            view: view?,
        })
    }
}

impl Default for CacheFacade {
    /// In-memory stores with default options.
    fn default() -> Self {
        let options = CacheOptions::default();
        let data = memory_data_store(&options);
        let view: ViewBackend = Arc::new(MemoryStore::<String>::new(
            MEMORY_CACHE_TYPE,
            DEFAULT_DOC_EXPIRES_MS,
        ));
        Self::with_backends(options, data, view)
    }
}

fn pin_backend_types(options: &mut CacheOptions, data: &DataBackend, view: &ViewBackend) {
    for (option, actual) in [
        (&mut options.data_cache_type, data.cache_type()),
        (&mut options.view_cache_type, view.cache_type()),
    ] {
        if option.as_str() != actual {
            debug!(requested = %option, actual, "cache type follows the configured backend");
            *option = actual.to_string();
        }
    }
}

fn memory_data_store(options: &CacheOptions) -> DataBackend {
    let limit = usize::try_from(options.data_cache_size_limit_bytes).unwrap_or(usize::MAX);
    Arc::new(
        MemoryStore::<DataValue>::new(MEMORY_CACHE_TYPE, DEFAULT_MEMORY_EXPIRES_MS)
        .with_size_limit(limit),
    )
}

async fn clear_store<V: Send + 'static>(
    name: &'static str,
    store: &dyn CacheBackend<V>,
    prevented: bool,
) -> Result<ClearOutcome> {
    if prevented {
        debug!(store = name, "clear prevented by configuration");
        return Ok(ClearOutcome::Prevented);
    }
    store.clear_cache().await.map(|()| ClearOutcome::Cleared)
}
