//! Scripted fetcher for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use http::{header, HeaderMap, HeaderValue, StatusCode};

use offkit_net::{Fetcher, NetError, Request, Response};

/// Fetcher answering from a scripted path→response table, with an offline
/// switch and a call log.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, (u16, String)>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script a response for a path.
    pub(crate) fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Make every fetch fail with a transport error.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches issued for a path.
    pub(crate) fn calls_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(path.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::RequestFailed("offline".to_string()));
        }

        let routes = self.routes.lock().unwrap();
        match routes.get(&path) {
            Some((status, body)) => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                Ok(Response::new(
                    request.id,
                    request.url.clone(),
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::OK),
                    headers,
                    Bytes::from(body.clone()),
                ))
            }
            None => Ok(Response::new(
                request.id,
                request.url.clone(),
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                Bytes::new(),
            )),
        }
    }
}
