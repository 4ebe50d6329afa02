//! Walkthrough: install a worker over an in-memory site, then pull the
//! network out and watch cached content keep serving.
//!
//! Run with: cargo run -p offkit-sw --example offline_demo

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use tracing::info;
use url::Url;

use offkit_common::{init_logging, LogConfig};
use offkit_net::{Fetcher, NetError, Request, Response};
use offkit_sw::{CacheStore, ServiceWorker, WorkerConfig};

/// Toy origin serving a handful of pages, with a connectivity switch.
struct DemoSite {
    offline: AtomicBool,
}

impl DemoSite {
    fn page_for(path: &str) -> Option<&'static str> {
        match path {
            "/" | "/index.html" => Some("<h1>Welcome</h1>"),
            "/about.html" => Some("<h1>About us</h1>"),
            "/404.html" => Some("<h1>Page not found</h1>"),
            "/assets/css/main.css" => Some("body { margin: 0 }"),
            _ => None,
        }
    }
}

#[async_trait]
impl Fetcher for DemoSite {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::RequestFailed("network unreachable".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );

        match Self::page_for(request.url.path()) {
            Some(body) => Ok(Response::new(
                request.id,
                request.url.clone(),
                StatusCode::OK,
                headers,
                Bytes::from_static(body.as_bytes()),
            )),
            None => Ok(Response::new(
                request.id,
                request.url.clone(),
                StatusCode::NOT_FOUND,
                headers,
                Bytes::new(),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> offkit_common::Result<()> {
    init_logging(LogConfig::default().with_filter("offkit_sw=debug,offline_demo=info"));

    let origin = Url::parse("https://demo.example")
        .map_err(|e| offkit_common::OffkitError::config_with_source("invalid origin", e))?;
    let mut config = WorkerConfig::for_origin(origin.clone());
    config.core_assets = vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/404.html".to_string(),
        "/assets/css/main.css".to_string(),
    ];

    let site = Arc::new(DemoSite {
        offline: AtomicBool::new(false),
    });
    let (worker, _events) = ServiceWorker::new(config, CacheStore::in_memory(), site.clone());

    worker.install().await?;
    worker.activate().await?;
    info!(version = worker.version(), "worker active");

    let online = worker
        .handle_fetch(navigate(&origin, "/about.html"))
        .await
        .expect("intercepted");
    info!(from_cache = online.from_cache, "online: /about.html served");

    site.offline.store(true, Ordering::SeqCst);
    info!("network unplugged");

    let cached = worker
        .handle_fetch(navigate(&origin, "/index.html"))
        .await
        .expect("intercepted");
    info!(from_cache = cached.from_cache, "offline: /index.html served from cache");

    let fallback = worker
        .handle_fetch(navigate(&origin, "/never-visited.html"))
        .await
        .expect("intercepted");
    info!(
        from_cache = fallback.from_cache,
        bytes = fallback.body.len(),
        "offline: unknown page degraded gracefully"
    );

    Ok(())
}

fn navigate(origin: &Url, path: &str) -> Request {
    Request::get(origin.join(path).expect("valid demo path")).header(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml"),
    )
}
