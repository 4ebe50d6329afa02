//! Resource classification.
//!
//! Maps a request path to the caching strategy that handles it. The policy
//! is pure data: a prefix list, an extension set, and a default. Every
//! same-origin GET path classifies to exactly one strategy.

use crate::config::WorkerConfig;

/// Caching strategy for a classified resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Try the network, fall back to cache.
    NetworkFirst,
    /// Serve from cache, fetch only on a miss.
    CacheFirst,
    /// Serve stale from cache, revalidate in the background.
    StaleWhileRevalidate,
}

/// Pure path classifier built from the worker configuration.
///
/// Precedence is fixed: network-first prefixes, then static-asset
/// extensions, then the stale-while-revalidate default for navigational
/// content. No strategy re-checks another's applicability.
#[derive(Debug, Clone)]
pub struct Classifier {
    network_first_prefixes: Vec<String>,
    static_asset_extensions: Vec<String>,
}

impl Classifier {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            network_first_prefixes: config.network_first_prefixes.clone(),
            static_asset_extensions: config
                .static_asset_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Classify a request path.
    pub fn classify(&self, path: &str) -> Strategy {
        if self
            .network_first_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Strategy::NetworkFirst;
        }

        if self
            .extension_of(path)
            .map(|ext| self.static_asset_extensions.iter().any(|e| e == &ext))
            .unwrap_or(false)
        {
            return Strategy::CacheFirst;
        }

        Strategy::StaleWhileRevalidate
    }

    /// Extension of the last path segment, lowercased.
    fn extension_of(&self, path: &str) -> Option<String> {
        let segment = path.rsplit('/').next().unwrap_or(path);
        segment
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}
