//! Invalidation Module
//!
//! Describes which entries to purge when content changes: either one exact
//! key, or every key matching a collection/entity pattern.

use serde::{Deserialize, Serialize};

use crate::cache::key::normalize_identifier;
use crate::error::{CacheError, Result};

// == Invalidation Query ==
/// A purge request against a single store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvalidationQuery {
    /// Point delete of one exact key
    Key { key: String },
    /// Pattern delete over every live key
    Pattern(PatternQuery),
}

impl InvalidationQuery {
    pub fn key(key: impl Into<String>) -> Self {
        InvalidationQuery::Key { key: key.into() }
    }
}

impl From<PatternQuery> for InvalidationQuery {
    fn from(pattern: PatternQuery) -> Self {
        InvalidationQuery::Pattern(pattern)
    }
}

// == Pattern Query ==
/// Structural attributes used to find related entries.
///
/// A key matches when it contains the store prefix and either:
/// - `collection_name` together with `entity_id` or `entity_name`, or
/// - `collection_name_plural` (list pages are purged regardless of entity).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternQuery {
    #[serde(default, alias = "model_name")]
    pub collection_name: Option<String>,
    #[serde(default, alias = "model_name_plural")]
    pub collection_name_plural: Option<String>,
    #[serde(default, alias = "docid")]
    pub entity_id: Option<String>,
    #[serde(default, alias = "docname")]
    pub entity_name: Option<String>,
}

impl PatternQuery {
    /// Starts a pattern scoped to one collection, e.g. `"item"`.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Starts a pattern that purges list keys, e.g. `"items"`.
    pub fn plural(name: impl Into<String>) -> Self {
        Self {
            collection_name_plural: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_plural(mut self, name: impl Into<String>) -> Self {
        self.collection_name_plural = Some(name.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    // == Compile ==
    /// Validates the criteria and prepares a matcher for `prefix`.
    ///
    /// Empty strings count as absent: an empty needle would match every key.
    pub fn compile<'a>(&'a self, prefix: &'a str) -> Result<PatternMatcher<'a>> {
        let collection = non_empty(&self.collection_name);
        let plural = non_empty(&self.collection_name_plural);
        let entity_id = non_empty(&self.entity_id);
        let entity_name = non_empty(&self.entity_name);

        let has_entity_criteria =
            collection.is_some() && (entity_id.is_some() || entity_name.is_some());
        if !has_entity_criteria && plural.is_none() {
            return Err(CacheError::MissingCriteria(
                "expected a key, a collection name with an entity id or name, or a plural collection name"
                    .to_string(),
            ));
        }

        Ok(PatternMatcher {
            prefix,
            collection: collection.map(Needle::new),
            plural: plural.map(Needle::new),
            entity_id: entity_id.map(Needle::new),
            entity_name: entity_name.map(Needle::new),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// == Needle ==
/// A search term in both its raw and key-normalized spelling.
#[derive(Debug)]
struct Needle<'a> {
    raw: &'a str,
    normalized: String,
}

impl<'a> Needle<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            normalized: normalize_identifier(raw),
        }
    }

    fn found_in(&self, key: &str) -> bool {
        key.contains(self.raw) || key.contains(self.normalized.as_str())
    }
}

// == Pattern Matcher ==
/// A validated pattern, ready to test keys during a scan.
#[derive(Debug)]
pub struct PatternMatcher<'a> {
    prefix: &'a str,
    collection: Option<Needle<'a>>,
    plural: Option<Needle<'a>>,
    entity_id: Option<Needle<'a>>,
    entity_name: Option<Needle<'a>>,
}

impl PatternMatcher<'_> {
    pub fn matches(&self, key: &str) -> bool {
        if !key.contains(self.prefix) {
            return false;
        }

        if self.plural.as_ref().is_some_and(|p| p.found_in(key)) {
            return true;
        }

        match &self.collection {
            Some(collection) if collection.found_in(key) => {
                self.entity_id.as_ref().is_some_and(|n| n.found_in(key))
                    || self.entity_name.as_ref().is_some_and(|n| n.found_in(key))
            }
            _ => false,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_and_id() {
        let query = PatternQuery::collection("item").with_entity_id("42");
        let matcher = query.compile("data").unwrap();

        assert!(matcher.matches("data:item:42"));
        assert!(!matcher.matches("data:items"));
        assert!(!matcher.matches("data:article:7"));
        assert!(!matcher.matches("view:item:42"));
    }

    #[test]
    fn test_plural_is_unconditional() {
        let query = PatternQuery::plural("items");
        let matcher = query.compile("data").unwrap();

        assert!(matcher.matches("data:items"));
        assert!(matcher.matches("data:itemsqqqpageeee2"));
        assert!(!matcher.matches("data:item:42"));
    }

    #[test]
    fn test_entity_name_normalized() {
        let query = PatternQuery::collection("item").with_entity_name("Hello World");
        let matcher = query.compile("memory").unwrap();

        assert!(matcher.matches("memory:-item-hello-world"));
        assert!(!matcher.matches("memory:-item-goodbye"));
    }

    #[test]
    fn test_missing_criteria() {
        let cases = [
            PatternQuery::default(),
            PatternQuery::collection("item"),
            PatternQuery::default().with_entity_id("42"),
            PatternQuery::collection("item").with_entity_id(""),
            PatternQuery::plural(""),
        ];

        for query in cases {
            assert!(
                matches!(query.compile("data"), Err(CacheError::MissingCriteria(_))),
                "{query:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialize_forms() {
        let key: InvalidationQuery = serde_json::from_str(r#"{"key":"memory:x"}"#).unwrap();
        assert_eq!(key, InvalidationQuery::key("memory:x"));

        let pattern: InvalidationQuery = serde_json::from_str(
            r#"{"model_name":"item","model_name_plural":"items","docid":"42"}"#,
        )
        .unwrap();
        assert_eq!(
            pattern,
            InvalidationQuery::Pattern(
                PatternQuery::collection("item")
                    .with_plural("items")
                    .with_entity_id("42")
            )
        );
    }
}
