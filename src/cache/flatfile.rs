//! Flat-File Store Module
//!
//! View store that keeps one JSON file per entry in a directory, so rendered
//! pages survive a restart. Same TTL, accounting and invalidation semantics
//! as the memory store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheBackend, CacheEntry, CacheStats, InvalidationQuery};
use crate::error::Result;

/// Backend kind reported by [`FlatFileStore`].
pub const FLATFILE_CACHE_TYPE: &str = "flatfile";

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Longest encoded key used verbatim as a file stem. Longer keys are cut
/// and suffixed with a digest so names stay under the usual 255-byte limit.
const MAX_PLAIN_STEM: usize = 200;
const HASHED_STEM_PREFIX: usize = 120;
const HASH_SEPARATOR: char = '~';

/// On-disk form of one entry. The key is kept alongside the value because
/// hashed file names cannot be decoded back into it.
#[derive(Debug, Serialize, Deserialize)]
struct ViewFile {
    #[serde(default)]
    key: String,
    #[serde(flatten)]
    entry: CacheEntry<String>,
}

#[derive(Debug)]
struct FileState {
    stats: CacheStats,
    default_ttl_ms: u64,
}

// == Flat-File Store ==
/// Directory-backed store for rendered views.
///
/// Operations are serialized through an async mutex held across the file
/// I/O, which keeps reads and writes of one key from interleaving.
#[derive(Debug)]
pub struct FlatFileStore {
    dir: PathBuf,
    state: Mutex<FileState>,
}

impl FlatFileStore {
    // == Constructor ==
    /// Opens (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>, default_ttl_ms: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "flat-file view store ready");

        Ok(Self {
            dir,
            state: Mutex::new(FileState {
                stats: CacheStats::new(),
                default_ttl_ms,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXTENSION}", file_stem(key)))
    }

    /// Lists every entry file with the key its name decodes to. Hashed
    /// names carry `None`; their key is only known from the file itself.
    async fn entry_files(&self) -> Result<Vec<(Option<String>, PathBuf)>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let name_key = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if stem.contains(HASH_SEPARATOR) => None,
                Some(stem) => match decode_file_name(stem) {
                    Some(key) => Some(key),
                    None => continue,
                },
                None => continue,
            };
            files.push((name_key, path));
        }
        Ok(files)
    }
}

/// Reads the file at `path`. A file that no longer parses is removed and
/// reads as absent.
async fn read_view_file(path: &Path) -> Result<Option<ViewFile>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(file) => Ok(Some(file)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "removing unreadable view file");
            remove_file(path).await?;
            Ok(None)
        }
    }
}

/// Removes the file when its entry has expired; returns whether it went.
async fn discard_if_expired(path: &Path, now: u64) -> Result<bool> {
    match read_view_file(path).await? {
        Some(file) if file.entry.is_expired_at(now) => remove_file(path).await,
        _ => Ok(false),
    }
}

async fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl CacheBackend<String> for FlatFileStore {
    fn cache_type(&self) -> &str {
        FLATFILE_CACHE_TYPE
    }

    fn prefix(&self) -> &str {
        FLATFILE_CACHE_TYPE
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let path = self.path_for(key);
        let now = current_timestamp_ms();

        match read_view_file(&path).await? {
            Some(file) if file.entry.is_expired_at(now) => {
                remove_file(&path).await?;
                state.stats.record_miss();
                debug!(key, "purged expired view file on read");
                Ok(None)
            }
            // Legacy files carry no key; hashed names are checked against theirs
            Some(file) if file.key.is_empty() || file.key == key => {
                state.stats.record_hit();
                Ok(Some(file.entry.value))
            }
            _ => {
                state.stats.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl_ms: Option<u64>) -> Result<u64> {
        let state = self.state.lock().await;
        let ttl = ttl_ms.unwrap_or(state.default_ttl_ms);
        let path = self.path_for(key);
        let temp = path.with_extension(TEMP_EXTENSION);

        let bytes = serde_json::to_vec(&ViewFile {
            key: key.to_string(),
            entry: CacheEntry::new(value, ttl),
        })?;
        fs::write(&temp, bytes).await?;
        fs::rename(&temp, &path).await?;

        debug!(key, ttl_ms = ttl, "stored view file");
        Ok(ttl)
    }

    async fn del(&self, query: &InvalidationQuery) -> Result<usize> {
        let pattern = match query {
            InvalidationQuery::Key { key } => {
                let _state = self.state.lock().await;
                return Ok(usize::from(remove_file(&self.path_for(key)).await?));
            }
            InvalidationQuery::Pattern(pattern) => pattern,
        };

        let matcher = pattern.compile(FLATFILE_CACHE_TYPE)?;
        let _state = self.state.lock().await;
        let now = current_timestamp_ms();
        let mut purged = 0;

        for (name_key, path) in self.entry_files().await? {
            let key = match name_key {
                Some(key) => key,
                None => match read_view_file(&path).await {
                    Ok(Some(file)) => file.key,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping view file");
                        continue;
                    }
                },
            };

            if matcher.matches(&key) {
                if remove_file(&path).await? {
                    purged += 1;
                }
            } else if let Err(err) = discard_if_expired(&path, now).await {
                warn!(path = %path.display(), error = %err, "skipping view file");
            }
        }

        info!(dir = %self.dir.display(), purged, "pattern invalidation complete");
        Ok(purged)
    }

    async fn clear_cache(&self) -> Result<()> {
        let _state = self.state.lock().await;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some(ENTRY_EXTENSION) | Some(TEMP_EXTENSION)) {
                remove_file(&path).await?;
            }
        }
        info!(dir = %self.dir.display(), "flat-file view store cleared");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let _state = self.state.lock().await;
        let now = current_timestamp_ms();
        let mut removed = 0;

        for (_, path) in self.entry_files().await? {
            match discard_if_expired(&path, now).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "skipping view file"),
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let state = self.state.lock().await;
        let mut stats = state.stats;
        stats.set_size(self.entry_files().await?.len());
        Ok(stats)
    }

    async fn set_expires(&self, ttl_ms: u64) -> Result<()> {
        self.state.lock().await.default_ttl_ms = ttl_ms;
        Ok(())
    }
}

// == File Names ==
/// Maps a key to a portable file name: `[a-z0-9-]` pass through, every
/// other byte becomes `_xx` (lower-case hex).
fn encode_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

/// Encoded name, or for long keys a readable head plus the key's SHA-256.
fn file_stem(key: &str) -> String {
    let encoded = encode_file_name(key);
    if encoded.len() <= MAX_PLAIN_STEM {
        return encoded;
    }
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    // Encoded names are ASCII, so any byte offset is a char boundary
    format!("{}{HASH_SEPARATOR}{digest}", &encoded[..HASHED_STEM_PREFIX])
}

fn decode_file_name(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PatternQuery;
    use crate::error::CacheError;

    async fn open_store(dir: &tempfile::TempDir) -> FlatFileStore {
        FlatFileStore::open(dir.path().join("views"), 300_000)
            .await
            .unwrap()
    }

    #[test]
    fn test_file_name_encoding() {
        assert_eq!(encode_file_name("flatfile:-item-42"), "flatfile_3a-item-42");
        assert_eq!(
            decode_file_name("flatfile_3a-item-42").as_deref(),
            Some("flatfile:-item-42")
        );
        assert_eq!(decode_file_name("bad_z"), None);
    }

    #[tokio::test]
    async fn test_set_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(&dir).await;
            store
                .set("flatfile:-item-1", "<h1>one</h1>".to_string(), None)
                .await
                .unwrap();
        }

        let store = open_store(&dir).await;
        assert_eq!(
            store.get("flatfile:-item-1").await.unwrap(),
            Some("<h1>one</h1>".to_string())
        );
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_expired_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.set("flatfile:k", "v".to_string(), Some(0)).await.unwrap();

        assert_eq!(store.get("flatfile:k").await.unwrap(), None);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn test_pattern_and_point_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        for key in ["flatfile:-item-42", "flatfile:-items", "flatfile:-article-7"] {
            store.set(key, "v".to_string(), None).await.unwrap();
        }

        let purged = store
            .del(&PatternQuery::collection("item").with_entity_id("42").into())
            .await
            .unwrap();
        assert_eq!(purged, 1);

        let purged = store
            .del(&InvalidationQuery::key("flatfile:-items"))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.stats().await.unwrap().size, 1);

        let result = store.del(&PatternQuery::default().into()).await;
        assert!(matches!(result, Err(CacheError::MissingCriteria(_))));
    }

    #[tokio::test]
    async fn test_clear_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.set("flatfile:old", "v".to_string(), Some(0)).await.unwrap();
        store.set("flatfile:new", "v".to_string(), None).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.stats().await.unwrap().size, 1);

        store.clear_cache().await.unwrap();
        store.clear_cache().await.unwrap();
        assert_eq!(store.stats().await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let path = store.path_for("flatfile:broken");
        fs::write(&path, b"not json").await.unwrap();

        assert_eq!(store.get("flatfile:broken").await.unwrap(), None);
        assert_eq!(store.stats().await.unwrap().misses, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_abort_scans() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .set("flatfile:-item-42", "v".to_string(), None)
            .await
            .unwrap();
        let junk = store.dir().join("flatfile_3a-junk.json");
        fs::write(&junk, b"").await.unwrap();

        let purged = store
            .del(&PatternQuery::collection("item").with_entity_id("42").into())
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.get("flatfile:-item-42").await.unwrap(), None);
        assert!(!junk.exists());

        fs::write(&junk, b"{").await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert!(!junk.exists());
    }

    #[tokio::test]
    async fn test_long_keys_get_hashed_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let long_a = format!("flatfile:-item-7?q={}", "x/".repeat(200));
        let long_b = format!("flatfile:-item-8?q={}", "x/".repeat(200));

        store.set(&long_a, "a".to_string(), None).await.unwrap();
        store.set(&long_b, "b".to_string(), None).await.unwrap();

        let name = store.path_for(&long_a);
        let name = name.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.len() < 255);
        assert_ne!(store.path_for(&long_a), store.path_for(&long_b));
        assert_eq!(store.get(&long_a).await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.get(&long_b).await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.stats().await.unwrap().size, 2);

        // Pattern purges see the key stored inside hashed files
        let purged = store
            .del(&PatternQuery::collection("item").with_entity_id("7").into())
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.get(&long_a).await.unwrap(), None);
        assert_eq!(store.get(&long_b).await.unwrap().as_deref(), Some("b"));
    }
}
