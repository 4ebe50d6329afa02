//! Service worker core.
//!
//! Owns the lifecycle state machine and wires the classifier, strategy
//! executors, cache store, and offline fallback together behind the fetch
//! interception hook.

use std::sync::Arc;

use http::{header, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use offkit_common::{OffkitError, Result};
use offkit_net::{Fetcher, Request, Response};

use crate::classify::Classifier;
use crate::config::WorkerConfig;
use crate::fallback::FallbackResolver;
use crate::store::{CacheStore, RequestKey};
use crate::strategy::StrategyContext;
use crate::sync::{SubmissionQueue, SyncReport, CONTACT_FORM_SYNC, CONTENT_SYNC};

// ==================== State ====================

/// Service worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Initial state, nothing cached yet.
    Parsed,
    /// Installing (core assets being pre-cached).
    Installing,
    /// Installed but not yet controlling requests.
    Installed,
    /// Activating (stale partitions being evicted).
    Activating,
    /// Active and intercepting requests.
    Activated,
    /// Replaced or install failed.
    Redundant,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Parsed
    }
}

impl WorkerState {
    /// Check if the worker intercepts requests in this state.
    pub fn is_active(&self) -> bool {
        *self == WorkerState::Activated
    }

    /// Check if the worker is permanently out of service.
    pub fn is_redundant(&self) -> bool {
        *self == WorkerState::Redundant
    }
}

// ==================== Events ====================

/// Notifications emitted as the worker changes state or finishes background
/// work.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Lifecycle state changed.
    StateChanged { state: WorkerState },
    /// Stale partitions were deleted.
    CacheEvicted { deleted: Vec<String> },
    /// A sync drain finished.
    SyncCompleted { report: SyncReport },
    /// A periodic content refresh finished.
    ContentRefreshed { stored: usize },
}

// ==================== Messages ====================

/// Control message from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Force immediate activation.
    SkipWaiting,
    /// Ask for the active version identifier.
    GetVersion,
    /// Manually evict stale partitions.
    CleanCache,
}

/// Reply to a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageReply {
    Ack,
    Version { version: String },
    CacheCleaned { deleted: usize },
}

// ==================== Service Worker ====================

/// The offline caching worker.
pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    classifier: Classifier,
    strategies: StrategyContext,
    fallback: FallbackResolver,
    state: RwLock<WorkerState>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl ServiceWorker {
    /// Create a worker over a store and a transport.
    pub fn new(
        config: WorkerConfig,
        store: CacheStore,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let config = Arc::new(config);
        let classifier = Classifier::from_config(&config);
        let strategies =
            StrategyContext::new(Arc::clone(&config), store.clone(), Arc::clone(&fetcher));
        let fallback = FallbackResolver::new(Arc::clone(&config), store.clone());

        (
            Self {
                config,
                store,
                fetcher,
                classifier,
                strategies,
                fallback,
                state: RwLock::new(WorkerState::Parsed),
                event_tx,
            },
            event_rx,
        )
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// The worker's version identifier (the primary partition name).
    pub fn version(&self) -> &str {
        self.config.version()
    }

    /// The worker's configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(OffkitError::state(format!(
                "cannot move from {:?} to {to:?}",
                *state
            )));
        }
        *state = to;
        let _ = self.event_tx.send(WorkerEvent::StateChanged { state: to });
        Ok(())
    }

    async fn force_state(&self, to: WorkerState) {
        *self.state.write().await = to;
        let _ = self.event_tx.send(WorkerEvent::StateChanged { state: to });
    }

    // ==================== Lifecycle ====================

    /// Install: pre-cache every core asset.
    ///
    /// Install is atomic: nothing is written until every core asset has
    /// been fetched successfully, and any failure leaves the worker
    /// redundant with no partially populated primary partition.
    pub async fn install(&self) -> Result<()> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)
            .await?;
        info!(version = self.version(), "install: pre-caching core assets");

        match self.precache_core_assets().await {
            Ok(count) => {
                self.transition(WorkerState::Installing, WorkerState::Installed)
                    .await?;
                info!(assets = count, "install complete");
                Ok(())
            }
            Err(install_error) => {
                if let Err(error) = self.store.delete_partition(&self.config.primary_cache) {
                    warn!(%error, "failed to roll back primary partition");
                }
                self.force_state(WorkerState::Redundant).await;
                error!(%install_error, "install failed, worker is redundant");
                Err(install_error)
            }
        }
    }

    async fn precache_core_assets(&self) -> Result<usize> {
        self.store.open_or_create(&self.config.primary_cache)?;
        self.store.open_or_create(&self.config.offline_cache)?;

        let fetches = self.config.core_assets.iter().map(|path| {
            let fetcher = Arc::clone(&self.fetcher);
            let url = self.config.origin.join(path);
            async move {
                let url = url.map_err(|e| {
                    OffkitError::config_with_source(format!("invalid core asset path {path}"), e)
                })?;
                let request = Request::get(url);
                let key = RequestKey::from_request(&request);
                let response = fetcher.fetch(request).await.map_err(|e| {
                    OffkitError::install_with_source(
                        format!("failed to fetch core asset {path}"),
                        e,
                    )
                })?;
                if !response.ok() {
                    return Err(OffkitError::install(format!(
                        "core asset {path} returned {}",
                        response.status
                    )));
                }
                Ok((key, response))
            }
        });

        // Stage every fetch before the first write so a failure cannot leave
        // a half-populated partition behind.
        let staged = futures::future::try_join_all(fetches).await?;
        let count = staged.len();
        for (key, response) in staged {
            self.store
                .store_response(&self.config.primary_cache, &key, &response)?;
        }
        Ok(count)
    }

    /// Activate: evict partitions from previous deploys, then start
    /// intercepting.
    ///
    /// Eviction completes before the state flips to [`WorkerState::Activated`],
    /// so no request is ever served against a partially cleaned store.
    pub async fn activate(&self) -> Result<()> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;
        info!(version = self.version(), "activate: evicting stale cache partitions");

        let keep = self.config.live_partitions();
        let deleted = self.store.evict_all_except(&keep)?;
        if !deleted.is_empty() {
            info!(?deleted, "deleted stale cache partitions");
        }
        let _ = self.event_tx.send(WorkerEvent::CacheEvicted { deleted });

        self.transition(WorkerState::Activating, WorkerState::Activated)
            .await
    }

    /// Force immediate activation of an installed worker.
    pub async fn skip_waiting(&self) -> Result<()> {
        match self.state().await {
            WorkerState::Activated => Ok(()),
            WorkerState::Installed => self.activate().await,
            state => Err(OffkitError::state(format!(
                "skip-waiting requires an installed worker, state is {state:?}"
            ))),
        }
    }

    // ==================== Fetch interception ====================

    /// Handle an intercepted request.
    ///
    /// Returns `None` when the worker does not act on the request (not
    /// activated yet, non-GET, or cross-origin); the caller then lets the
    /// request proceed to the network untouched. When the worker does act,
    /// a response is always produced: strategy failures resolve through the
    /// offline fallback chain.
    pub async fn handle_fetch(&self, request: Request) -> Option<Response> {
        if !self.state().await.is_active() {
            return None;
        }
        if request.method != Method::GET {
            return None;
        }
        if request.url.origin() != self.config.origin.origin() {
            return None;
        }

        let strategy = self.classifier.classify(request.url.path());
        debug!(url = %request.url, ?strategy, "intercepting request");

        match self.strategies.run(strategy, request.clone()).await {
            Ok(response) => Some(response),
            Err(error) => {
                debug!(
                    url = %request.url,
                    category = error.category(),
                    %error,
                    "strategy failed, resolving offline fallback"
                );
                Some(self.fallback.resolve(&request))
            }
        }
    }

    // ==================== Control messages ====================

    /// Handle a control message from the page.
    pub async fn handle_message(&self, message: WorkerMessage) -> Result<MessageReply> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(MessageReply::Ack)
            }
            WorkerMessage::GetVersion => Ok(MessageReply::Version {
                version: self.version().to_string(),
            }),
            WorkerMessage::CleanCache => {
                let deleted = self.store.evict_all_except(&self.config.live_partitions())?;
                let count = deleted.len();
                let _ = self.event_tx.send(WorkerEvent::CacheEvicted { deleted });
                Ok(MessageReply::CacheCleaned { deleted: count })
            }
        }
    }

    // ==================== Background sync ====================

    /// Drain queued form submissions after connectivity returns.
    ///
    /// Failures stay queued; retry scheduling belongs to the platform, not
    /// the worker.
    pub async fn sync(&self, tag: &str, queue: &dyn SubmissionQueue) -> Result<SyncReport> {
        if tag != CONTACT_FORM_SYNC {
            debug!(tag, "ignoring unknown sync tag");
            return Ok(SyncReport::default());
        }

        let endpoint = self
            .config
            .origin
            .join(&self.config.sync_endpoint)
            .map_err(|e| OffkitError::config_with_source("invalid sync endpoint", e))?;

        let mut report = SyncReport::default();
        for submission in queue.pending().await? {
            let content_type = HeaderValue::try_from(submission.content_type.as_str())
                .unwrap_or_else(|_| HeaderValue::from_static("application/x-www-form-urlencoded"));
            let request = Request::post(endpoint.clone(), submission.body.clone())
                .header(header::CONTENT_TYPE, content_type);

            match self.fetcher.fetch(request).await {
                Ok(response) if response.ok() => {
                    queue.remove(submission.id).await?;
                    report.delivered += 1;
                    debug!(id = submission.id, "form submission delivered");
                }
                Ok(response) => {
                    report.failed += 1;
                    warn!(
                        id = submission.id,
                        status = %response.status,
                        "form submission rejected, leaving queued"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(id = submission.id, %error, "form submission failed, leaving queued");
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "sync drain finished"
        );
        let _ = self.event_tx.send(WorkerEvent::SyncCompleted { report });
        Ok(report)
    }

    /// Refresh configured content assets in the background.
    ///
    /// Best effort: individual failures are logged and skipped.
    pub async fn periodic_sync(&self, tag: &str) -> Result<usize> {
        if tag != CONTENT_SYNC {
            debug!(tag, "ignoring unknown periodic sync tag");
            return Ok(0);
        }

        let mut stored = 0;
        for path in &self.config.refresh_assets {
            let url = match self.config.origin.join(path) {
                Ok(url) => url,
                Err(error) => {
                    warn!(path, %error, "skipping invalid refresh asset");
                    continue;
                }
            };
            let request = Request::get(url);
            let key = RequestKey::from_request(&request);

            match self.fetcher.fetch(request).await {
                Ok(response) if response.ok() => {
                    match self
                        .store
                        .store_response(&self.config.primary_cache, &key, &response)
                    {
                        Ok(_) => stored += 1,
                        Err(error) => warn!(%key, %error, "failed to refresh content entry"),
                    }
                }
                Ok(response) => {
                    debug!(path, status = %response.status, "content refresh skipped non-success response");
                }
                Err(error) => {
                    debug!(path, %error, "content refresh fetch failed");
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::ContentRefreshed { stored });
        Ok(stored)
    }
}
