//! Offline fallback resolution.
//!
//! Invoked only when a strategy executor cannot produce any response. The
//! chain is total: whatever the state of the cache, the resolver terminates
//! with a response and never errors.

use std::sync::Arc;

use tracing::{debug, warn};

use offkit_net::{Request, Response};

use crate::config::WorkerConfig;
use crate::store::{CacheStore, RequestKey};

/// Self-contained notice served when nothing else resolves.
const OFFLINE_NOTICE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Offline</title>
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <style>
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
      display: flex;
      justify-content: center;
      align-items: center;
      min-height: 100vh;
      margin: 0;
      background: #1e3a5f;
      color: white;
      text-align: center;
      padding: 20px;
    }
    .offline-content { max-width: 500px; }
    h1 { font-size: 2.5rem; margin-bottom: 1rem; }
    p { font-size: 1.1rem; margin-bottom: 2rem; opacity: 0.9; }
    .btn {
      border: 1px solid rgba(255, 255, 255, 0.4);
      color: white;
      padding: 12px 24px;
      border-radius: 8px;
      text-decoration: none;
      display: inline-block;
      margin: 10px;
    }
  </style>
</head>
<body>
  <div class="offline-content">
    <h1>You're Offline</h1>
    <p>It looks like you're not connected to the internet. Some content may not be available, but you can still browse cached pages.</p>
    <a href="/" class="btn">Try Again</a>
    <a href="/index.html" class="btn">Go Home</a>
  </div>
</body>
</html>
"#;

/// Resolves a best-effort response once network and strategy-level cache
/// lookups have both failed.
pub(crate) struct FallbackResolver {
    config: Arc<WorkerConfig>,
    store: CacheStore,
}

impl FallbackResolver {
    pub(crate) fn new(config: Arc<WorkerConfig>, store: CacheStore) -> Self {
        Self { config, store }
    }

    /// Produce a substitute response. Resolution order: exact cache match,
    /// cached home document (HTML requests only), cached not-found
    /// document, synthesized offline notice.
    pub(crate) fn resolve(&self, request: &Request) -> Response {
        let key = RequestKey::from_request(request);
        if let Some(entry) = self.lookup_any(&key) {
            debug!(url = %request.url, "offline fallback: exact cache match");
            return entry.to_response(request);
        }

        if request.accepts_html() {
            for document in [&self.config.home_document, &self.config.not_found_document] {
                if let Some(entry) = self
                    .document_key(document)
                    .and_then(|key| self.lookup_any(&key))
                {
                    debug!(url = %request.url, %document, "offline fallback: cached document");
                    return entry.to_response(request);
                }
            }
        }

        debug!(url = %request.url, "offline fallback: synthesized notice");
        Response::html(request.id, request.url.clone(), OFFLINE_NOTICE)
    }

    fn lookup_any(&self, key: &RequestKey) -> Option<crate::store::CacheEntry> {
        match self.store.match_any(key) {
            Ok(entry) => entry,
            Err(error) => {
                // A failing store must not break the no-throw guarantee.
                warn!(%key, %error, "offline fallback cache lookup failed");
                None
            }
        }
    }

    fn document_key(&self, path: &str) -> Option<RequestKey> {
        self.config
            .origin
            .join(path)
            .ok()
            .as_ref()
            .map(RequestKey::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{header, HeaderMap, HeaderValue, StatusCode};
    use offkit_net::RequestId;
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{path}")).unwrap()
    }

    fn html_request(path: &str) -> Request {
        Request::get(url(path)).header(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        )
    }

    fn response(path: &str, body: &str) -> Response {
        Response::new(
            RequestId::new(),
            url(path),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    fn resolver(store: CacheStore) -> FallbackResolver {
        let config = Arc::new(WorkerConfig::for_origin(
            Url::parse("https://example.com").unwrap(),
        ));
        FallbackResolver::new(config, store)
    }

    #[test]
    fn test_exact_match_wins() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        let request = html_request("/about.html");
        store
            .store_response(
                "v1",
                &RequestKey::from_request(&request),
                &response("/about.html", "about"),
            )
            .unwrap();

        let resolved = resolver(store).resolve(&request);
        assert!(resolved.from_cache);
        assert_eq!(resolved.body.as_ref(), b"about");
    }

    #[test]
    fn test_html_request_gets_home_document() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        store
            .store_response(
                "v1",
                &RequestKey::get(&url("/index.html")),
                &response("/index.html", "home"),
            )
            .unwrap();

        let resolved = resolver(store).resolve(&html_request("/never-cached.html"));
        assert!(resolved.from_cache);
        assert_eq!(resolved.body.as_ref(), b"home");
    }

    #[test]
    fn test_not_found_document_is_third_choice() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        store
            .store_response(
                "v1",
                &RequestKey::get(&url("/404.html")),
                &response("/404.html", "lost?"),
            )
            .unwrap();

        let resolved = resolver(store).resolve(&html_request("/never-cached.html"));
        assert_eq!(resolved.body.as_ref(), b"lost?");
    }

    #[test]
    fn test_non_html_request_skips_document_fallbacks() {
        let store = CacheStore::in_memory();
        store.open_or_create("v1").unwrap();
        store
            .store_response(
                "v1",
                &RequestKey::get(&url("/index.html")),
                &response("/index.html", "home"),
            )
            .unwrap();

        // No Accept: text/html, so the cached home page is not a substitute.
        let resolved = resolver(store).resolve(&Request::get(url("/data.bin")));
        assert!(!resolved.from_cache);
        assert!(resolved.text().unwrap().contains("You're Offline"));
    }

    #[test]
    fn test_empty_store_always_yields_notice() {
        let resolved = resolver(CacheStore::in_memory()).resolve(&html_request("/anything"));
        assert_eq!(resolved.status, StatusCode::OK);
        assert_eq!(
            resolved.content_type.as_ref().map(|m| m.essence_str()),
            Some("text/html")
        );
        assert!(resolved.text().unwrap().contains("You're Offline"));
    }
}
