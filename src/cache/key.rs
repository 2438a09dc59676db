//! Cache Key Module
//!
//! Maps a (namespace, raw identifier) pair to a normalized cache key.
//!
//! The transform is one-way: `?`, `.`, `&` and `=` become the tokens `qqq`,
//! `ddd`, `nnn` and `eee`, every other character outside `[a-z0-9]` becomes
//! `-`, and the result is lower-cased. Every occurrence is substituted, not
//! just the first one.

use std::fmt;

use serde::Serialize;

// == Cache Key ==
/// A normalized cache key of the form `namespace:identifier`.
///
/// Only produced by [`generate_key`]; always matches `^[a-z0-9-]*:[a-z0-9-]*$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace portion (everything before the first `:`).
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map(|(ns, _)| ns).unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

// == Generate Key ==
/// Builds the cache key for `raw` inside `namespace`.
///
/// Total over any input; an empty identifier yields `namespace:`.
pub fn generate_key(namespace: &str, raw: &str) -> CacheKey {
    let mut key = String::with_capacity(namespace.len() + raw.len() + 8);
    push_plain(&mut key, namespace);
    key.push(':');
    push_identifier(&mut key, raw);
    CacheKey(key)
}

// == Normalize Identifier ==
/// Applies the identifier half of the key transform on its own.
///
/// Lets invalidation criteria such as `"My Post"` find keys built from them.
pub fn normalize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    push_identifier(&mut out, raw);
    out
}

fn push_identifier(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '?' => out.push_str("qqq"),
            '.' => out.push_str("ddd"),
            '&' => out.push_str("nnn"),
            '=' => out.push_str("eee"),
            c => push_char(out, c),
        }
    }
}

fn push_plain(out: &mut String, s: &str) {
    for ch in s.chars() {
        push_char(out, ch);
    }
}

fn push_char(out: &mut String, ch: char) {
    if ch.is_ascii_alphanumeric() {
        out.push(ch.to_ascii_lowercase());
    } else {
        out.push('-');
    }
}
