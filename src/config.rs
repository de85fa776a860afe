//! Configuration management for CineStream
//!
//! Handles config file loading/saving.
//! Config is stored at ~/.config/cinestream/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::danmaku::DEFAULT_COMMENT_API_URL;
use crate::api::douban::DEFAULT_METADATA_URL;
use crate::api::gateway::ProxyRelay;
use crate::registry::DEFAULT_BACKEND_URL;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeout of the direct request tier
    pub direct_timeout_ms: u64,
    /// Timeout of each proxy relay tier
    pub relay_timeout_ms: u64,
    /// Bound on one content-resolution tier, raised to the gateway's worst case
    pub tier_timeout_ms: u64,
    /// Endpoint of the built-in catalog backend
    pub default_backend_url: String,
    /// Scraped metadata source
    pub metadata_url: String,
    /// Comment backend
    pub comment_api_url: String,
    pub comment_cache_ttl_secs: u64,
    pub max_comment_events: usize,
    /// Seconds before the end that count as finished
    pub resume_guard_secs: u64,
    /// Streams this short are never auto-skipped
    pub min_skip_duration_secs: u64,
    /// Durable key/value store (default ~/.local/share/cinestream/store.json)
    pub store_path: Option<PathBuf>,
    pub store_quota_bytes: usize,
    /// Extra ad-segment URI substrings
    pub ad_patterns: Vec<String>,
    /// Ordered proxy relay pool
    pub proxies: Vec<ProxyRelay>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            direct_timeout_ms: 6_000,
            relay_timeout_ms: 9_000,
            tier_timeout_ms: 15_000,
            default_backend_url: DEFAULT_BACKEND_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            comment_api_url: DEFAULT_COMMENT_API_URL.to_string(),
            comment_cache_ttl_secs: 20 * 60,
            max_comment_events: 3_000,
            resume_guard_secs: 10,
            min_skip_duration_secs: 180,
            store_path: None,
            store_quota_bytes: 5 * 1024 * 1024,
            ad_patterns: Vec::new(),
            proxies: ProxyRelay::defaults(),
        }
    }
}

impl Config {
    /// Get config file path (~/.config/cinestream/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cinestream").join("config.toml"))
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Load config from `path`; a missing or malformed file yields defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match toml::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Store location, falling back to the user data directory
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("cinestream")
                .join("store.json")
        })
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    pub fn comment_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.comment_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.direct_timeout(), Duration::from_secs(6));
        assert_eq!(config.comment_cache_ttl(), Duration::from_secs(1200));
        assert_eq!(config.proxies.len(), 3);
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            tier_timeout_ms = 500
            ad_patterns = ["promo"]

            [[proxies]]
            prefix = "https://relay.example/?u="
            "#,
        )
        .unwrap();
        assert_eq!(config.tier_timeout_ms, 500);
        assert_eq!(config.relay_timeout_ms, 9_000);
        assert_eq!(config.default_backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.proxies.len(), 1);
        assert!(config.proxies[0].encode);
        assert_eq!(config.ad_patterns, vec!["promo"]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("cinestream-config-{}", uuid::Uuid::new_v4()))
            .join("config.toml");
        let config = Config {
            resume_guard_secs: 30,
            store_path: Some(PathBuf::from("/tmp/store.json")),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_yields_default() {
        let config = Config::load_from(Path::new("/nonexistent/cinestream.toml"));
        assert_eq!(config, Config::default());
    }
}
