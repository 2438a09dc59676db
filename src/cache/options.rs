//! Cache Options Module
//!
//! Per-category expiration and route configuration plus the global cache
//! switches. Overrides use the flat key names of the options object
//! (`item_doc_cache_expires`, `view_cache_status`, ...) and are merged
//! right-biased and shallow: a supplied key replaces the current value
//! wholesale, lists included.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CacheError, Result};

/// Override key carrying the facade's global status.
pub const STATUS_OPTION: &str = "status";

// == Defaults ==
const ONE_MINUTE_MS: u64 = 60_000;
const ONE_MEGABYTE: u64 = 1_000_000;
/// Default expiration for every content category: five minutes.
pub const DEFAULT_DOC_EXPIRES_MS: u64 = 5 * ONE_MINUTE_MS;
/// Default data cache byte limit: 30 MB.
pub const DEFAULT_DATA_CACHE_SIZE_LIMIT: u64 = 30 * ONE_MEGABYTE;

const DOC_EXPIRES_SUFFIX: &str = "_doc_cache_expires";
const DOC_ROUTES_SUFFIX: &str = "_doc_cache";
const LIST_ROUTES_SUFFIX: &str = "_list_cache";

// == Cache Status ==
/// Whether a cache (or the whole facade) is serving lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    #[default]
    Active,
    Disabled,
}

impl CacheStatus {
    pub fn is_active(self) -> bool {
        self == CacheStatus::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Active => "active",
            CacheStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only the exact string `"active"` enables; anything else disables.
impl From<&str> for CacheStatus {
    fn from(value: &str) -> Self {
        if value == "active" {
            CacheStatus::Active
        } else {
            CacheStatus::Disabled
        }
    }
}

impl From<String> for CacheStatus {
    fn from(value: String) -> Self {
        CacheStatus::from(value.as_str())
    }
}

impl From<bool> for CacheStatus {
    fn from(value: bool) -> Self {
        if value {
            CacheStatus::Active
        } else {
            CacheStatus::Disabled
        }
    }
}

/// `"active"` and `true` enable; every other JSON value disables.
impl From<&Value> for CacheStatus {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => CacheStatus::from(s.as_str()),
            Value::Bool(b) => CacheStatus::from(*b),
            _ => CacheStatus::Disabled,
        }
    }
}

// == Content Category ==
/// Content categories with their own expiration and route settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentCategory {
    Item,
    Asset,
    Collection,
    Compilation,
    User,
    Category,
    Tag,
    ContentType,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 8] = [
        ContentCategory::Item,
        ContentCategory::Asset,
        ContentCategory::Collection,
        ContentCategory::Compilation,
        ContentCategory::User,
        ContentCategory::Category,
        ContentCategory::Tag,
        ContentCategory::ContentType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::Item => "item",
            ContentCategory::Asset => "asset",
            ContentCategory::Collection => "collection",
            ContentCategory::Compilation => "compilation",
            ContentCategory::User => "user",
            ContentCategory::Category => "category",
            ContentCategory::Tag => "tag",
            ContentCategory::ContentType => "contenttype",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn default_routes(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            ContentCategory::Item => (&["item/:id", "article/:id"], &["items", "articles"]),
            ContentCategory::Asset => (&["asset/:id"], &["assets"]),
            ContentCategory::Collection => (&["collection/:id"], &["collections"]),
            ContentCategory::Compilation => (&["compilation/:id"], &["compilations"]),
            ContentCategory::User => (&["author/:id"], &["authors"]),
            ContentCategory::Category => (&["category/:id"], &["browse/categories/:id"]),
            ContentCategory::Tag => (&["tag/:id"], &["browse/tags/:id"]),
            ContentCategory::ContentType => {
                (&["contenttype/:id"], &["browse/contenttypes/:id"])
            }
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentCategory {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        ContentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CacheError::InvalidRequest(format!("unknown content category `{s}`")))
    }
}

// == Feature Options ==
/// Expiration and route templates for one content category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureOptions {
    /// TTL applied to this category's entries, in milliseconds
    pub doc_expires_ms: u64,
    /// Single-document route templates, e.g. `item/:id`
    pub doc_route_patterns: Vec<String>,
    /// List route templates, e.g. `items`
    pub list_route_patterns: Vec<String>,
}

impl FeatureOptions {
    fn defaults(category: ContentCategory) -> Self {
        let (docs, lists) = category.default_routes();
        Self {
            doc_expires_ms: DEFAULT_DOC_EXPIRES_MS,
            doc_route_patterns: docs.iter().map(|s| s.to_string()).collect(),
            list_route_patterns: lists.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Which kind of route template matched a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Doc,
    List,
}

// == Cache Options ==
/// Complete cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    pub data_cache_status: CacheStatus,
    pub view_cache_status: CacheStatus,
    pub data_cache_type: String,
    pub view_cache_type: String,
    /// Byte budget for the data cache, enforced by LRU eviction
    pub data_cache_size_limit_bytes: u64,
    pub prevent_clear_data_cache_on_start: bool,
    pub prevent_clear_view_cache_on_start: bool,
    pub debug: bool,
    features: [FeatureOptions; 8],
    /// Override keys this crate does not interpret, kept verbatim
    pub extra: Map<String, Value>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            data_cache_status: CacheStatus::Active,
            view_cache_status: CacheStatus::Active,
            data_cache_type: "memory".to_string(),
            view_cache_type: "flatfile".to_string(),
            data_cache_size_limit_bytes: DEFAULT_DATA_CACHE_SIZE_LIMIT,
            prevent_clear_data_cache_on_start: false,
            prevent_clear_view_cache_on_start: false,
            debug: false,
            features: ContentCategory::ALL.map(FeatureOptions::defaults),
            extra: Map::new(),
        }
    }
}

impl CacheOptions {
    /// Builds options by merging `overrides` onto the built-in defaults.
    pub fn with_overrides(overrides: &Map<String, Value>) -> Result<Self> {
        let mut options = Self::default();
        options.merge(overrides)?;
        Ok(options)
    }

    pub fn feature(&self, category: ContentCategory) -> &FeatureOptions {
        &self.features[category.index()]
    }

    pub fn feature_mut(&mut self, category: ContentCategory) -> &mut FeatureOptions {
        &mut self.features[category.index()]
    }

    // == Merge ==
    /// Shallow right-biased merge of `overrides` into these options.
    ///
    /// All-or-nothing: if any known key carries the wrong type, an
    /// `InvalidOption` error is returned and `self` is left untouched.
    pub fn merge(&mut self, overrides: &Map<String, Value>) -> Result<()> {
        let mut next = self.clone();
        for (key, value) in overrides {
            next.apply(key, value)?;
        }
        *self = next;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            "data_cache_status" => self.data_cache_status = CacheStatus::from(value),
            "view_cache_status" => self.view_cache_status = CacheStatus::from(value),
            "dataCacheType" => self.data_cache_type = expect_string(key, value)?,
            "viewCacheType" => self.view_cache_type = expect_string(key, value)?,
            "dataCacheSizeLimitInBytes" => {
                self.data_cache_size_limit_bytes = expect_u64(key, value)?
            }
            "prevent_clear_data_cache_on_start" => {
                self.prevent_clear_data_cache_on_start = expect_bool(key, value)?
            }
            "prevent_clear_view_cache_on_start" => {
                self.prevent_clear_view_cache_on_start = expect_bool(key, value)?
            }
            "debug" => self.debug = expect_bool(key, value)?,
            // Global status lives on the facade
            STATUS_OPTION => {}
            _ => {
                if let Some(category) = feature_key(key, DOC_EXPIRES_SUFFIX) {
                    self.feature_mut(category).doc_expires_ms = expect_u64(key, value)?;
                } else if let Some(category) = feature_key(key, DOC_ROUTES_SUFFIX) {
                    self.feature_mut(category).doc_route_patterns = expect_strings(key, value)?;
                } else if let Some(category) = feature_key(key, LIST_ROUTES_SUFFIX) {
                    self.feature_mut(category).list_route_patterns = expect_strings(key, value)?;
                } else {
                    self.extra.insert(key.to_string(), value.clone());
                }
            }
        }
        Ok(())
    }

    // == To Map ==
    /// Renders the options back into the flat key layout used for overrides.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("data_cache_status".into(), self.data_cache_status.as_str().into());
        map.insert("view_cache_status".into(), self.view_cache_status.as_str().into());
        map.insert("dataCacheType".into(), self.data_cache_type.clone().into());
        map.insert("viewCacheType".into(), self.view_cache_type.clone().into());
        map.insert(
            "dataCacheSizeLimitInBytes".into(),
            self.data_cache_size_limit_bytes.into(),
        );
        map.insert(
            "prevent_clear_data_cache_on_start".into(),
            self.prevent_clear_data_cache_on_start.into(),
        );
        map.insert(
            "prevent_clear_view_cache_on_start".into(),
            self.prevent_clear_view_cache_on_start.into(),
        );
        map.insert("debug".into(), self.debug.into());

        for category in ContentCategory::ALL {
            let feature = self.feature(category);
            let name = category.as_str();
            map.insert(format!("{name}{DOC_EXPIRES_SUFFIX}"), feature.doc_expires_ms.into());
            map.insert(
                format!("{name}{DOC_ROUTES_SUFFIX}"),
                feature.doc_route_patterns.clone().into(),
            );
            map.insert(
                format!("{name}{LIST_ROUTES_SUFFIX}"),
                feature.list_route_patterns.clone().into(),
            );
        }
        map
    }

    // == Route Matching ==
    /// Finds the category whose route templates match `path`.
    ///
    /// Templates are compared segment by segment; `:name` segments match any
    /// single segment. Leading/trailing slashes and the query are ignored.
    pub fn match_route(&self, path: &str) -> Option<(ContentCategory, RouteKind)> {
        let path = path.split('?').next().unwrap_or_default();
        ContentCategory::ALL.into_iter().find_map(|category| {
            let feature = self.feature(category);
            if feature.doc_route_patterns.iter().any(|t| route_matches(t, path)) {
                Some((category, RouteKind::Doc))
            } else if feature.list_route_patterns.iter().any(|t| route_matches(t, path)) {
                Some((category, RouteKind::List))
            } else {
                None
            }
        })
    }

    /// TTL for an entry served from `path`, if any category claims it.
    pub fn expires_for_route(&self, path: &str) -> Option<u64> {
        self.match_route(path)
            .map(|(category, _)| self.feature(category).doc_expires_ms)
    }
}

fn route_matches(template: &str, path: &str) -> bool {
    let mut template_parts = template.trim_matches('/').split('/');
    let mut path_parts = path.trim_matches('/').split('/');
    loop {
        match (template_parts.next(), path_parts.next()) {
            (None, None) => return true,
            (Some(t), Some(p)) if t.starts_with(':') && !p.is_empty() => {}
            (Some(t), Some(p)) if t == p => {}
            _ => return false,
        }
    }
}

fn feature_key(key: &str, suffix: &str) -> Option<ContentCategory> {
    key.strip_suffix(suffix)
        .and_then(|name| ContentCategory::from_str(name).ok())
}

fn invalid(key: &str, expected: &str, value: &Value) -> CacheError {
    CacheError::InvalidOption {
        key: key.to_string(),
        reason: format!("expected {expected}, got {value}"),
    }
}

fn expect_u64(key: &str, value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| invalid(key, "a non-negative integer", value))
}

fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean", value))
}

fn expect_string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(key, "a string", value))
}

fn expect_strings(key: &str, value: &Value) -> Result<Vec<String>> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| invalid(key, "an array of strings", value))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = CacheOptions::default();
        for category in ContentCategory::ALL {
            assert_eq!(options.feature(category).doc_expires_ms, 300_000);
        }
        assert_eq!(
            options.feature(ContentCategory::Item).doc_route_patterns,
            vec!["item/:id", "article/:id"]
        );
        assert_eq!(
            options.feature(ContentCategory::User).list_route_patterns,
            vec!["authors"]
        );
        assert_eq!(options.data_cache_size_limit_bytes, 30_000_000);
        assert_eq!(options.view_cache_type, "flatfile");
    }

    #[test]
    fn test_override_touches_only_named_field() {
        let options =
            CacheOptions::with_overrides(&overrides(json!({"item_doc_cache_expires": 1000})))
                .unwrap();

        assert_eq!(options.feature(ContentCategory::Item).doc_expires_ms, 1000);
        assert_eq!(options.feature(ContentCategory::Asset).doc_expires_ms, 300_000);
        assert_eq!(
            options.feature(ContentCategory::Item).doc_route_patterns,
            vec!["item/:id", "article/:id"]
        );
    }

    #[test]
    fn test_list_override_replaces_wholesale() {
        let mut options = CacheOptions::default();
        options
            .merge(&overrides(json!({"item_list_cache": ["posts"]})))
            .unwrap();
        assert_eq!(
            options.feature(ContentCategory::Item).list_route_patterns,
            vec!["posts"]
        );
    }

    #[test]
    fn test_status_normalization() {
        let options = CacheOptions::with_overrides(&overrides(json!({
            "data_cache_status": "paused",
            "view_cache_status": true,
        })))
        .unwrap();
        assert_eq!(options.data_cache_status, CacheStatus::Disabled);
        assert_eq!(options.view_cache_status, CacheStatus::Active);
    }

    #[test]
    fn test_invalid_override_leaves_options_untouched() {
        let mut options = CacheOptions::default();
        let result = options.merge(&overrides(json!({
            "item_doc_cache_expires": 10,
            "tag_doc_cache_expires": "soon",
        })));

        assert!(matches!(result, Err(CacheError::InvalidOption { ref key, .. }) if key == "tag_doc_cache_expires"));
        assert_eq!(options, CacheOptions::default());
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let options =
            CacheOptions::with_overrides(&overrides(json!({"widget_doc_cache_expires": 5})))
                .unwrap();
        assert_eq!(options.extra.get("widget_doc_cache_expires"), Some(&json!(5)));
        assert_eq!(options.to_map().get("widget_doc_cache_expires"), Some(&json!(5)));
    }

    #[test]
    fn test_to_map_round_trips_through_merge() {
        let mut options = CacheOptions::default();
        options.feature_mut(ContentCategory::Tag).doc_expires_ms = 42;
        options.debug = true;

        let rebuilt = CacheOptions::with_overrides(&options.to_map()).unwrap();
        assert_eq!(rebuilt, options);
    }

    #[test]
    fn test_match_route() {
        let options = CacheOptions::default();
        assert_eq!(
            options.match_route("/item/42"),
            Some((ContentCategory::Item, RouteKind::Doc))
        );
        assert_eq!(
            options.match_route("/items?page=2"),
            Some((ContentCategory::Item, RouteKind::List))
        );
        assert_eq!(
            options.match_route("/browse/tags/rust"),
            Some((ContentCategory::Tag, RouteKind::List))
        );
        assert_eq!(options.match_route("/item"), None);
        assert_eq!(options.match_route("/about"), None);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("contenttype".parse::<ContentCategory>().unwrap(), ContentCategory::ContentType);
        assert!("widget".parse::<ContentCategory>().is_err());
    }
}
