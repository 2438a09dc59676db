//! Cache Module
//!
//! Keyed TTL caching for rendered views and data records, with
//! pattern-based invalidation and usage accounting.

mod backend;
mod entry;
mod facade;
mod flatfile;
mod invalidate;
mod key;
mod options;
mod stats;
mod store;


// Re-export public types
pub use backend::CacheBackend;
pub use entry::{CacheEntry, Weigh};
pub use facade::{
    CacheFacade, ClearOutcome, ClearReport, DataBackend, DataValue, FacadeStats, ViewBackend,
};
pub use flatfile::{FlatFileStore, FLATFILE_CACHE_TYPE};
pub use invalidate::{InvalidationQuery, PatternMatcher, PatternQuery};
pub use key::{generate_key, normalize_identifier, CacheKey};
pub use options::{
    CacheOptions, CacheStatus, ContentCategory, FeatureOptions, RouteKind,
    DEFAULT_DATA_CACHE_SIZE_LIMIT, DEFAULT_DOC_EXPIRES_MS, STATUS_OPTION,
};
pub use stats::CacheStats;
pub use store::{MemoryStore, DEFAULT_MEMORY_EXPIRES_MS, MEMORY_CACHE_TYPE};
