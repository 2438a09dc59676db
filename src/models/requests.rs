//! Request DTOs for the HTTP API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{InvalidationQuery, PatternQuery};

/// Which store an invalidation targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTarget {
    Data,
    View,
    #[default]
    All,
}

impl CacheTarget {
    pub fn includes_data(self) -> bool {
        matches!(self, CacheTarget::Data | CacheTarget::All)
    }

    pub fn includes_view(self) -> bool {
        matches!(self, CacheTarget::View | CacheTarget::All)
    }
}

/// Request body for POST /cache/invalidate
///
/// Either `key` or the pattern attributes must be supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub cache: CacheTarget,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(flatten)]
    pub pattern: PatternQuery,
}

impl InvalidateRequest {
    /// A non-empty `key` wins over pattern attributes.
    pub fn query(&self) -> InvalidationQuery {
        match self.key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => InvalidationQuery::key(key),
            None => InvalidationQuery::Pattern(self.pattern.clone()),
        }
    }
}

/// Request body for PUT /cache/status
///
/// Any JSON value is accepted; only `"active"` and `true` enable the cache.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    pub status: Value,
}

/// Request body for PUT /item/:id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub title: String,
    pub body: String,
}

impl UpdateItemRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.title.trim().is_empty() {
            return Some("Title cannot be empty".to_string());
        }
        None
    }
}
