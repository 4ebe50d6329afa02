//! Worker configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// Service worker configuration.
///
/// Built once at startup and captured immutably by the worker; changing the
/// pattern lists or asset lists changes caching behavior without touching
/// any code path. The primary cache name is version-qualified and doubles as
/// the worker's version identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin this worker controls. Requests to any other origin pass
    /// through untouched.
    pub origin: Url,

    /// Primary cache partition, e.g. "site-cache-v1.0.0".
    pub primary_cache: String,

    /// Offline cache partition, kept across activations alongside the
    /// primary.
    pub offline_cache: String,

    /// Assets guaranteed to be cached before the worker activates.
    pub core_assets: Vec<String>,

    /// Path prefixes that always try the network first.
    pub network_first_prefixes: Vec<String>,

    /// File extensions served cache-first.
    pub static_asset_extensions: Vec<String>,

    /// Cached document served to HTML requests when offline.
    pub home_document: String,

    /// Cached document tried after the home document.
    pub not_found_document: String,

    /// Assets re-fetched by periodic content sync.
    pub refresh_assets: Vec<String>,

    /// Endpoint queued form submissions are delivered to.
    pub sync_endpoint: String,
}

impl WorkerConfig {
    /// Create a configuration for an origin with the default policy tables.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin,
            primary_cache: "site-cache-v1.0.0".to_string(),
            offline_cache: "site-offline-v1.0.0".to_string(),
            core_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/about.html".to_string(),
                "/contact.html".to_string(),
                "/404.html".to_string(),
                "/assets/css/main.css".to_string(),
                "/assets/js/main.js".to_string(),
                "/manifest.json".to_string(),
            ],
            network_first_prefixes: vec!["/api/".to_string(), "/contact.html".to_string()],
            static_asset_extensions: vec![
                "css", "js", "jpg", "jpeg", "png", "gif", "webp", "svg", "woff", "woff2", "ttf",
                "eot", "ico",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            home_document: "/index.html".to_string(),
            not_found_document: "/404.html".to_string(),
            refresh_assets: vec!["/".to_string(), "/index.html".to_string()],
            sync_endpoint: "/contact".to_string(),
        }
    }

    /// The worker's version identifier.
    pub fn version(&self) -> &str {
        &self.primary_cache
    }

    /// Partitions that survive activation cleanup.
    pub fn live_partitions(&self) -> [&str; 2] {
        [&self.primary_cache, &self.offline_cache]
    }
}
