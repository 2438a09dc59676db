//! Periodic Cache - data and view caching for a content server
//!
//! A data cache memoizes backing records, a view cache memoizes rendered
//! pages, and both are purged by key or by content pattern when content
//! changes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheFacade;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
