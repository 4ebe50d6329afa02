//! # Offkit Net
//!
//! HTTP request/response model and async fetch layer for the Offkit offline
//! caching engine.
//!
//! ## Design Goals
//!
//! 1. **Async HTTP**: Non-blocking network requests
//! 2. **Cacheable responses**: Fully buffered bodies that can be captured
//!    into a cache partition and replayed later
//! 3. **Pluggable transport**: The [`Fetcher`] trait is the seam the
//!    service-worker core and tests plug into

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use mime::Mime;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Check whether the request declares it accepts HTML content.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            .unwrap_or(false)
    }
}

/// HTTP response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: RequestId,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: Option<Mime>,
    pub body: Bytes,
    /// Whether this response was served from a cache partition.
    pub from_cache: bool,
}

impl Response {
    /// Create a response, deriving the content type from the headers.
    pub fn new(
        request_id: RequestId,
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Mime>().ok());

        Self {
            request_id,
            url,
            status,
            headers,
            content_type,
            body,
            from_cache: false,
        }
    }

    /// Create a synthesized HTML response (status 200).
    pub fn html(request_id: RequestId, url: Url, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Self::new(
            request_id,
            url,
            StatusCode::OK,
            headers,
            Bytes::from(body.into()),
        )
    }

    /// Check if the response was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }

    /// Get the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.body).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// Transport seam for issuing requests.
///
/// The service-worker core talks to the network exclusively through this
/// trait, so tests can substitute scripted transports and embedders can
/// bring their own client.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Offkit/1.0".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// Reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: FetcherConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        req_builder = req_builder.header("Accept-Language", &self.config.accept_language);

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response::new(request.id, url, status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_builder() {
        let url = Url::parse("https://example.com").unwrap();
        let request = Request::get(url.clone())
            .header(
                HeaderName::from_static("accept"),
                HeaderValue::from_static("application/json"),
            )
            .timeout(Duration::from_secs(10));

        assert_eq!(request.url, url);
        assert_eq!(request.method, Method::GET);
        assert!(request.headers.contains_key("accept"));
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_request_id_uniqueness() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_accepts_html() {
        let url = Url::parse("https://example.com/page").unwrap();
        let plain = Request::get(url.clone());
        assert!(!plain.accepts_html());

        let navigational = Request::get(url).header(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        assert!(navigational.accepts_html());
    }

    #[test]
    fn test_synthesized_html_response() {
        let url = Url::parse("https://example.com/offline").unwrap();
        let response = Response::html(RequestId::new(), url, "<h1>offline</h1>");

        assert!(response.ok());
        assert!(!response.from_cache);
        assert_eq!(
            response.content_type.as_ref().map(|m| m.essence_str()),
            Some("text/html")
        );
        assert_eq!(response.text().unwrap(), "<h1>offline</h1>");
    }

    #[test]
    fn test_response_json() {
        let url = Url::parse("https://example.com/data.json").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let response = Response::new(
            RequestId::new(),
            url,
            StatusCode::OK,
            headers,
            Bytes::from_static(b"{\"answer\":42}"),
        );

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["answer"], 42);
    }

    #[tokio::test]
    async fn test_http_fetcher_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/hello", server.uri())).unwrap();
        let response = fetcher.fetch(Request::get(url)).await.unwrap();

        assert!(response.ok());
        assert_eq!(response.text().unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_http_fetcher_post_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contact"))
            .and(body_string("name=a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/contact", server.uri())).unwrap();
        let response = fetcher
            .fetch(Request::post(url, Bytes::from_static(b"name=a")))
            .await
            .unwrap();

        assert!(response.ok());
    }

    #[tokio::test]
    async fn test_http_fetcher_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let response = fetcher.fetch(Request::get(url)).await.unwrap();

        // A reachable server is not a transport error; callers decide what
        // non-2xx means for their strategy.
        assert!(!response.ok());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
