//! Service wiring
//!
//! Builds every pipeline component from a [`Config`] and one shared
//! key/value store, so commands and tests construct the same graph.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{CatalogClient, DanmakuClient, Gateway, MetadataClient};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::WatchHistory;
use crate::models::{BackendDescriptor, PlaySource, RawContentRecord};
use crate::registry::{self, SourceRegistry};
use crate::resolver::ContentResolver;
use crate::store::{self, FileStore, SharedStore};
use crate::stream::comments::{self, CommentMatcher};
use crate::stream::playlist;
use crate::stream::{CheckpointStore, ManifestSanitizer, PlaybackSession};

/// Every key this application writes starts with this
pub const KEY_NAMESPACE: &str = "cine_";

/// Wired-up services
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub store: SharedStore,
    pub gateway: Gateway,
    pub registry: SourceRegistry,
    pub resolver: ContentResolver,
    pub comments: CommentMatcher,
    pub checkpoints: CheckpointStore,
    pub history: WatchHistory,
    pub sanitizer: ManifestSanitizer,
}

impl App {
    /// Services over the durable store named by `config`
    pub fn new(config: Config) -> Self {
        let path = config.resolved_store_path();
        debug!(path = %path.display(), "opening store");
        let store: SharedStore = Arc::new(FileStore::open(path, config.store_quota_bytes));
        Self::with_store(config, store)
    }

    /// Services over an explicit store (in-memory for tests)
    pub fn with_store(config: Config, store: SharedStore) -> Self {
        let gateway = Gateway::new(
            config.direct_timeout(),
            config.relay_timeout(),
            config.proxies.clone(),
        );
        let default = BackendDescriptor {
            endpoint_url: config.default_backend_url.clone(),
            ..registry::default_backend()
        };
        let registry = SourceRegistry::with_default(store.clone(), default);
        // A tier never gives up before the gateway has tried every relay
        let tier_timeout = config.tier_timeout().max(gateway.worst_case());
        let resolver = ContentResolver::new(
            CatalogClient::new(gateway.clone()),
            MetadataClient::with_base_url(gateway.clone(), &config.metadata_url),
            registry.clone(),
            tier_timeout,
        );
        let comments = CommentMatcher::new(
            DanmakuClient::with_base_url(gateway.clone(), &config.comment_api_url),
            TtlCache::new(store.clone(), comments::CACHE_PREFIX, config.comment_cache_ttl()),
        )
        .with_max_events(config.max_comment_events);
        let checkpoints =
            CheckpointStore::new(store.clone()).with_resume_guard(config.resume_guard_secs as f64);
        let sanitizer = ManifestSanitizer::with_extra_patterns(config.ad_patterns.iter().cloned());

        Self {
            history: WatchHistory::new(store.clone()),
            gateway,
            registry,
            resolver,
            comments,
            checkpoints,
            sanitizer,
            store,
            config,
        }
    }

    /// Playback session for one episode with the configured skip threshold
    ///
    /// Opening a session makes `episode_index` the content's last episode.
    pub fn session(&self, content_id: &str, episode_index: usize) -> PlaybackSession {
        self.history.remember_episode(content_id, episode_index);
        PlaybackSession::new(self.checkpoints.clone(), content_id, episode_index)
            .with_min_skip_duration(self.config.min_skip_duration_secs as f64)
    }

    /// Fetch a manifest through the gateway and strip its ad segments
    pub async fn fetch_manifest(&self, url: &str) -> Result<String> {
        let text = self.gateway.fetch(url).await?.into_text();
        if !text.trim_start().starts_with("#EXTM3U") {
            return Err(Error::MalformedResponse(format!("{} is not an HLS manifest", url)));
        }
        Ok(self.sanitizer.sanitize_with_base(&text, url))
    }

    /// Remove every application key from the store
    pub fn clear_cache(&self) -> usize {
        let purged = store::purge_prefix(self.store.as_ref(), KEY_NAMESPACE);
        info!(purged, "application cache cleared");
        purged
    }

    pub fn tier_timeout(&self) -> Duration {
        self.resolver.tier_timeout()
    }
}

/// Decode a record's play sources; empty is [`Error::NoPlayableSource`]
pub fn play_sources(record: &RawContentRecord) -> Result<Vec<PlaySource>> {
    let sources = playlist::decode(&record.packed_source_names, &record.packed_source_urls);
    if sources.is_empty() {
        return Err(Error::NoPlayableSource(record.title.clone()));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SkipPolicy;
    use crate::store::{KeyValueStore, MemoryStore};

    fn app() -> App {
        App::with_store(Config::default(), MemoryStore::shared())
    }

    fn record(names: &str, urls: &str) -> RawContentRecord {
        RawContentRecord {
            id: "1".into(),
            title: "Show".into(),
            poster_url: String::new(),
            synopsis: String::new(),
            director: String::new(),
            cast: String::new(),
            packed_source_names: names.into(),
            packed_source_urls: urls.into(),
            origin_endpoint: "http://a".into(),
            score_or_rank: None,
        }
    }

    #[test]
    fn test_play_sources() {
        let sources = play_sources(&record("m3u8", "e1$http://a/1.m3u8")).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(matches!(
            play_sources(&record("flash", "e1$http://a/1.swf")),
            Err(Error::NoPlayableSource(_))
        ));
    }

    #[test]
    fn test_tier_timeout_covers_gateway_worst_case() {
        // 6s direct + 3 relays x 9s
        assert_eq!(app().tier_timeout(), Duration::from_secs(33));

        let direct_only = App::with_store(
            Config {
                proxies: Vec::new(),
                ..Config::default()
            },
            MemoryStore::shared(),
        );
        assert_eq!(direct_only.tier_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_configured_default_backend() {
        let app = App::with_store(
            Config {
                default_backend_url: "http://mirror.local/api".into(),
                ..Config::default()
            },
            MemoryStore::shared(),
        );
        let default = app.registry.default_backend();
        assert_eq!(default.endpoint_url, "http://mirror.local/api");
        assert_eq!(default.id, registry::DEFAULT_BACKEND_ID);
    }

    #[test]
    fn test_clear_cache_only_touches_namespace() {
        let app = app();
        app.checkpoints.save("cine_progress_1_0", 50.0);
        app.checkpoints.set_skip_policy(SkipPolicy {
            intro_seconds: 10,
            outro_seconds: 0,
        });
        app.store.set("other_key", "1").unwrap();

        assert_eq!(app.clear_cache(), 3);
        assert_eq!(app.store.keys(), vec!["other_key".to_string()]);
    }

    #[test]
    fn test_session_uses_configured_threshold() {
        let app = App::with_store(
            Config {
                min_skip_duration_secs: 10,
                ..Config::default()
            },
            MemoryStore::shared(),
        );
        app.checkpoints.set_skip_policy(SkipPolicy {
            intro_seconds: 5,
            outro_seconds: 0,
        });
        let session = app.session("c", 2);
        assert_eq!(session.on_ready(60.0), Some(5.0));
        assert_eq!(app.history.last_episode("c"), Some(2));
    }
}
