//! Cache store manager: named, versioned partitions of request→response
//! pairs.
//!
//! A partition is a durable key→response mapping identified by a
//! version-qualified name. At most one partition per name is live at a time;
//! activation deletes partitions left behind by a previous deploy.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use offkit_common::{OffkitError, Result};
use offkit_net::{Request, Response};

/// Exact cache key: method + URL. No query-string normalization is
/// performed; `/page?a=1` and `/page` are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &http::Method, url: &Url) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    /// Key for a GET of the given URL.
    pub fn get(url: &Url) -> Self {
        Self::new(&http::Method::GET, url)
    }

    pub fn from_request(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A captured response. Entries are immutable once written; a new write for
/// the same key replaces the entry wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request key this entry answers.
    pub key: RequestKey,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Capture timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response under the given key.
    pub fn capture(key: RequestKey, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            key,
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    /// Replay the entry as a response to `request`.
    pub fn to_response(&self, request: &Request) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, value);
            }
        }

        let url = Url::parse(&self.key.url).unwrap_or_else(|_| request.url.clone());
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let mut response = Response::new(
            request.id,
            url,
            status,
            headers,
            Bytes::from(self.body.clone()),
        );
        response.from_cache = true;
        response
    }
}

/// Storage backend for cache partitions.
///
/// Implementations provide atomic per-key read/write semantics; no ordering
/// is guaranteed between concurrent writers to the same key (last write
/// wins).
pub trait CacheBackend: Send + Sync {
    /// Create the partition if it does not exist. Idempotent.
    fn open_partition(&self, name: &str) -> Result<()>;

    /// Check whether a partition exists.
    fn contains(&self, name: &str) -> Result<bool>;

    /// Names of all existing partitions.
    fn partition_names(&self) -> Result<Vec<String>>;

    /// Delete a partition and every entry in it. Returns whether it existed.
    fn delete_partition(&self, name: &str) -> Result<bool>;

    /// Exact-match lookup.
    fn lookup(&self, partition: &str, key: &RequestKey) -> Result<Option<CacheEntry>>;

    /// Write or replace an entry. The partition must exist.
    fn store(&self, partition: &str, entry: CacheEntry) -> Result<()>;
}

/// In-memory backend for tests and embedders with their own persistence.
#[derive(Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, HashMap<RequestKey, CacheEntry>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, HashMap<RequestKey, CacheEntry>>>> {
        self.partitions
            .read()
            .map_err(|_| OffkitError::cache("cache lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, HashMap<RequestKey, CacheEntry>>>> {
        self.partitions
            .write()
            .map_err(|_| OffkitError::cache("cache lock poisoned"))
    }
}

impl CacheBackend for MemoryBackend {
    fn open_partition(&self, name: &str) -> Result<()> {
        self.write()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    fn partition_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete_partition(&self, name: &str) -> Result<bool> {
        Ok(self.write()?.remove(name).is_some())
    }

    fn lookup(&self, partition: &str, key: &RequestKey) -> Result<Option<CacheEntry>> {
        Ok(self
            .read()?
            .get(partition)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn store(&self, partition: &str, entry: CacheEntry) -> Result<()> {
        let mut partitions = self.write()?;
        let entries = partitions
            .get_mut(partition)
            .ok_or_else(|| OffkitError::NotFound(format!("cache partition {partition}")))?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }
}

/// Cloneable handle over a cache backend exposing the manager API the
/// strategy executors and lifecycle hooks use.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Create the partition if missing; returns existing partitions as-is.
    pub fn open_or_create(&self, name: &str) -> Result<()> {
        self.backend.open_partition(name)
    }

    /// Exact-match lookup in one partition.
    pub fn lookup(&self, partition: &str, key: &RequestKey) -> Result<Option<CacheEntry>> {
        self.backend.lookup(partition, key)
    }

    /// Exact-match lookup across every partition.
    pub fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>> {
        for name in self.backend.partition_names()? {
            if let Some(entry) = self.backend.lookup(&name, key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Capture a response into a partition.
    ///
    /// Only successful (2xx) responses are written; anything else is
    /// skipped so a transient server error never becomes a permanently
    /// served cache entry. Returns whether the entry was written.
    pub fn store_response(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &Response,
    ) -> Result<bool> {
        if !response.ok() {
            debug!(%key, status = %response.status, "not caching non-success response");
            return Ok(false);
        }
        self.backend
            .store(partition, CacheEntry::capture(key.clone(), response))?;
        Ok(true)
    }

    /// Delete every partition whose name is not in `keep`. Returns the
    /// deleted names.
    pub fn evict_all_except(&self, keep: &[&str]) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.backend.partition_names()? {
            if !keep.contains(&name.as_str()) {
                debug!(partition = %name, "deleting stale cache partition");
                self.backend.delete_partition(&name)?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Delete one partition. Returns whether it existed.
    pub fn delete_partition(&self, name: &str) -> Result<bool> {
        self.backend.delete_partition(name)
    }

    /// Names of all existing partitions.
    pub fn partition_names(&self) -> Result<Vec<String>> {
        self.backend.partition_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use offkit_net::RequestId;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{path}")).unwrap()
    }

    fn response(path: &str, status: StatusCode, body: &str) -> Response {
        Response::new(
            RequestId::new(),
            url(path),
            status,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_open_is_idempotent() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();

        let key = RequestKey::get(&url("/a"));
        store
            .store_response("v1", &key, &response("/a", StatusCode::OK, "a"))
            .unwrap();

        store.open_or_create("v1").unwrap();
        assert!(store.lookup("v1", &key).unwrap().is_some());
    }

    #[test]
    fn test_store_replaces_entry() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        let key = RequestKey::get(&url("/a"));

        store
            .store_response("v1", &key, &response("/a", StatusCode::OK, "old"))
            .unwrap();
        store
            .store_response("v1", &key, &response("/a", StatusCode::OK, "new"))
            .unwrap();

        let entry = store.lookup("v1", &key).unwrap().unwrap();
        assert_eq!(entry.body, b"new");
    }

    #[test]
    fn test_error_responses_never_cached() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        let key = RequestKey::get(&url("/a"));

        let written = store
            .store_response(
                "v1",
                &key,
                &response("/a", StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            )
            .unwrap();

        assert!(!written);
        assert!(store.lookup("v1", &key).unwrap().is_none());
    }

    #[test]
    fn test_exact_match_only() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();

        let key = RequestKey::get(&url("/page"));
        store
            .store_response("v1", &key, &response("/page", StatusCode::OK, "x"))
            .unwrap();

        let variant = RequestKey::get(&url("/page?draft=1"));
        assert!(store.lookup("v1", &variant).unwrap().is_none());

        let head = RequestKey::new(&Method::HEAD, &url("/page"));
        assert!(store.lookup("v1", &head).unwrap().is_none());
    }

    #[test]
    fn test_evict_all_except() {
        let store = CacheStore::in_memory();
        store.open_or_create("site-cache-v0.9.0").unwrap();
        store.open_or_create("site-cache-v1.0.0").unwrap();
        store.open_or_create("site-offline-v1.0.0").unwrap();

        let deleted = store
            .evict_all_except(&["site-cache-v1.0.0", "site-offline-v1.0.0"])
            .unwrap();

        assert_eq!(deleted, vec!["site-cache-v0.9.0".to_string()]);
        assert_eq!(
            store.partition_names().unwrap(),
            vec![
                "site-cache-v1.0.0".to_string(),
                "site-offline-v1.0.0".to_string()
            ]
        );
    }

    #[test]
    fn test_match_any_searches_every_partition() {
        let store = CacheStore::in_memory();
        store.open_or_create("primary").unwrap();
        store.open_or_create("offline").unwrap();

        let key = RequestKey::get(&url("/rare.html"));
        store
            .store_response("offline", &key, &response("/rare.html", StatusCode::OK, "r"))
            .unwrap();

        assert!(store.lookup("primary", &key).unwrap().is_none());
        assert!(store.match_any(&key).unwrap().is_some());
    }

    #[test]
    fn test_entry_replay_marks_from_cache() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();

        let request = Request::get(url("/a"));
        let key = RequestKey::from_request(&request);
        store
            .store_response("v1", &key, &response("/a", StatusCode::OK, "hello"))
            .unwrap();

        let replayed = store
            .lookup("v1", &key)
            .unwrap()
            .unwrap()
            .to_response(&request);
        assert!(replayed.from_cache);
        assert_eq!(replayed.body, Bytes::from_static(b"hello"));
    }
}
