//! # Offkit SW
//!
//! Offline caching service-worker core: request interception with
//! per-resource caching strategies, named versioned cache partitions, and
//! graceful degradation when the network is unavailable.
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorker
//!     │  handle_fetch()
//!     ├── Classifier ──────── path → Strategy
//!     ├── StrategyContext ─── network-first / cache-first / stale-while-revalidate
//!     │       └── CacheStore ── named partitions (memory or SQLite)
//!     └── FallbackResolver ── exact match → home doc → 404 doc → offline notice
//!
//! Lifecycle: install (atomic core-asset pre-cache) → activate (stale
//! partition eviction) → intercepting. Control messages and background
//! sync tags arrive from the embedding platform.
//! ```
//!
//! Only same-origin GET requests are intercepted; everything else passes
//! through untouched.

pub mod classify;
pub mod config;
mod fallback;
pub mod sqlite;
pub mod store;
mod strategy;
pub mod sync;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{Classifier, Strategy};
pub use config::WorkerConfig;
pub use sqlite::SqliteBackend;
pub use store::{CacheBackend, CacheEntry, CacheStore, MemoryBackend, RequestKey};
pub use sync::{
    MemoryQueue, PendingSubmission, SubmissionQueue, SyncReport, CONTACT_FORM_SYNC, CONTENT_SYNC,
};
pub use worker::{
    MessageReply, ServiceWorker, WorkerEvent, WorkerMessage, WorkerState,
};
