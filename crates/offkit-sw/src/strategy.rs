//! Strategy executors.
//!
//! All three strategies share one failure contract: any unrecoverable
//! failure (network down or unusable response, and no usable cache entry)
//! propagates upward, where the worker routes it into the offline fallback
//! resolver. Per the error taxonomy, a non-2xx response counts as a network
//! failure here; error responses are never cached and never served.
//!
//! Background cache writes are detached tasks. Their failures are observed
//! through logging only and never reach the caller.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use offkit_common::{OffkitError, Result};
use offkit_net::{Fetcher, Request, Response};

use crate::classify::Strategy;
use crate::config::WorkerConfig;
use crate::store::{CacheStore, RequestKey};

/// Shared state the executors run against.
pub(crate) struct StrategyContext {
    config: Arc<WorkerConfig>,
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
}

impl StrategyContext {
    pub(crate) fn new(
        config: Arc<WorkerConfig>,
        store: CacheStore,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
        }
    }

    /// Run the executor for a classified request.
    pub(crate) async fn run(&self, strategy: Strategy, request: Request) -> Result<Response> {
        trace!(url = %request.url, ?strategy, "running strategy");
        match strategy {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    /// Network-first: fetch, persist in the background, fall back to the
    /// primary partition on failure.
    async fn network_first(&self, request: Request) -> Result<Response> {
        let key = RequestKey::from_request(&request);

        match self.try_network(request.clone()).await {
            Ok(response) => {
                self.spawn_store(key, response.clone());
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, %error, "network-first fetch failed, trying cache");
                match self.store.lookup(&self.config.primary_cache, &key)? {
                    Some(entry) => Ok(entry.to_response(&request)),
                    None => Err(error),
                }
            }
        }
    }

    /// Cache-first: a hit returns immediately with no network traffic;
    /// entries are trusted until the partition itself is replaced at the
    /// next deploy.
    async fn cache_first(&self, request: Request) -> Result<Response> {
        let key = RequestKey::from_request(&request);

        if let Some(entry) = self.store.match_any(&key)? {
            trace!(url = %request.url, "cache-first hit");
            return Ok(entry.to_response(&request));
        }

        let response = self.try_network(request.clone()).await?;
        if let Err(error) =
            self.store
                .store_response(&self.config.primary_cache, &key, &response)
        {
            warn!(%key, %error, "failed to persist cache-first response");
        }
        Ok(response)
    }

    /// Stale-while-revalidate: a hit is returned immediately while a
    /// detached fetch refreshes the entry for the next request. A miss
    /// waits for the network; a miss plus a failed fetch propagates to the
    /// offline fallback.
    async fn stale_while_revalidate(&self, request: Request) -> Result<Response> {
        let key = RequestKey::from_request(&request);

        match self.store.lookup(&self.config.primary_cache, &key)? {
            Some(entry) => {
                self.spawn_revalidate(request.clone(), key);
                Ok(entry.to_response(&request))
            }
            None => {
                let response = self.try_network(request.clone()).await?;
                if let Err(error) =
                    self.store
                        .store_response(&self.config.primary_cache, &key, &response)
                {
                    warn!(%key, %error, "failed to persist revalidated response");
                }
                Ok(response)
            }
        }
    }

    /// Fetch and gate on success: a transport error or a non-2xx status is
    /// a network failure for strategy purposes.
    async fn try_network(&self, request: Request) -> Result<Response> {
        let url = request.url.clone();
        match self.fetcher.fetch(request).await {
            Ok(response) if response.ok() => Ok(response),
            Ok(response) => Err(OffkitError::network(format!(
                "server returned {} for {url}",
                response.status
            ))),
            Err(error) => Err(OffkitError::network_with_source(
                format!("fetch failed for {url}"),
                error,
            )),
        }
    }

    /// Detached write into the primary partition.
    fn spawn_store(&self, key: RequestKey, response: Response) {
        let store = self.store.clone();
        let partition = self.config.primary_cache.clone();
        tokio::spawn(async move {
            if let Err(error) = store.store_response(&partition, &key, &response) {
                warn!(%key, %error, "background cache write failed");
            }
        });
    }

    /// Detached revalidation fetch; a successful result replaces the entry
    /// for future requests and never affects the response already returned.
    fn spawn_revalidate(&self, request: Request, key: RequestKey) {
        let fetcher = Arc::clone(&self.fetcher);
        let store = self.store.clone();
        let partition = self.config.primary_cache.clone();
        tokio::spawn(async move {
            match fetcher.fetch(request).await {
                Ok(response) if response.ok() => {
                    if let Err(error) = store.store_response(&partition, &key, &response) {
                        warn!(%key, %error, "revalidation cache write failed");
                    }
                }
                Ok(response) => {
                    debug!(%key, status = %response.status, "revalidation returned non-success response");
                }
                Err(error) => {
                    debug!(%key, %error, "revalidation fetch failed");
                }
            }
        });
    }
}
