//! Cross-backend content resolution
//!
//! Turns a [`ContentIdentifier`] into one primary record plus alternatives
//! from other backends. Primary resolution walks four tiers, each bounded by
//! its own timeout, and stops at the first success:
//!
//! 1. Endpoint hint: look the id up on that one backend.
//! 2. Scraped ids without a title hint: ask the metadata source for a title.
//! 3. Title fan-out: search every enabled backend concurrently; the first
//!    backend in registry order holding an exact title match wins. Each
//!    backend's search carries the tier timeout separately.
//! 4. Id fallback: look the id up on each enabled backend in registry order.
//!
//! Backend failures are logged and absorbed. A resolution that finds nothing
//! returns `None`, which callers show as "temporarily unavailable".

use futures::future::join_all;
use futures::stream::{FuturesOrdered, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::api::{CatalogClient, MetadataClient};
use crate::models::{
    normalize_title, BackendDescriptor, ContentIdentifier, OriginHint, RawContentRecord,
    ResolvedContent, SearchHit,
};
use crate::registry::SourceRegistry;
use crate::singleflight::SingleFlight;

/// Default bound on a single resolution tier
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(15);

struct Inner {
    catalog: CatalogClient,
    metadata: MetadataClient,
    registry: SourceRegistry,
    tier_timeout: Duration,
    flights: SingleFlight<String, Option<ResolvedContent>>,
}

/// Resolves identifiers against every enabled catalog backend
#[derive(Clone)]
pub struct ContentResolver {
    inner: Arc<Inner>,
}

impl ContentResolver {
    pub fn new(
        catalog: CatalogClient,
        metadata: MetadataClient,
        registry: SourceRegistry,
        tier_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                metadata,
                registry,
                tier_timeout,
                flights: SingleFlight::new(),
            }),
        }
    }

    pub fn metadata(&self) -> &MetadataClient {
        &self.inner.metadata
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.inner.registry
    }

    pub fn tier_timeout(&self) -> Duration {
        self.inner.tier_timeout
    }

    /// Resolve `id`, sharing the result with concurrent callers for the same id
    pub async fn resolve(&self, id: &ContentIdentifier) -> Option<ResolvedContent> {
        let this = self.clone();
        let owned = id.clone();
        self.inner
            .flights
            .run(id.flight_key(), move || async move { this.resolve_once(&owned).await })
            .await
    }

    #[instrument(skip(self), fields(id = %id.raw_id), level = "debug")]
    async fn resolve_once(&self, id: &ContentIdentifier) -> Option<ResolvedContent> {
        let backends = self.inner.registry.list_enabled();

        let Some(primary) = self.resolve_primary(id, &backends).await else {
            warn!(id = %id.raw_id, origin = ?id.origin, "content unavailable on every backend");
            return None;
        };

        info!(
            id = %id.raw_id,
            title = %primary.title,
            endpoint = %primary.origin_endpoint,
            "primary record resolved"
        );
        Some(self.with_alternatives(primary, &backends).await)
    }

    async fn resolve_primary(
        &self,
        id: &ContentIdentifier,
        backends: &[BackendDescriptor],
    ) -> Option<RawContentRecord> {
        if let Some(endpoint) = &id.endpoint_hint {
            let found = self
                .bounded("endpoint", self.lookup_id(endpoint, &id.raw_id))
                .await
                .flatten();
            if found.is_some() {
                return found;
            }
        }

        let title = match &id.title_hint {
            Some(title) => Some(title.trim().to_string()),
            None if id.origin == OriginHint::Scraped => self
                .bounded("metadata", self.inner.metadata.title_for(&id.raw_id))
                .await
                .flatten(),
            None => None,
        };

        if let Some(title) = title.filter(|t| !t.is_empty()) {
            let found = self.first_title_match(&title, backends).await;
            if found.is_some() {
                return found;
            }
        }

        self.first_id_match(&id.raw_id, backends).await
    }

    /// Tier 3: concurrent title search, first exact match in registry order
    ///
    /// Each backend is bounded on its own; a silent one counts as a non-match.
    async fn first_title_match(
        &self,
        title: &str,
        backends: &[BackendDescriptor],
    ) -> Option<RawContentRecord> {
        let mut searches: FuturesOrdered<_> = backends
            .iter()
            .map(|backend| self.bounded("title", self.exact_title(&backend.endpoint_url, title)))
            .collect();

        while let Some(found) = searches.next().await {
            if let Some(record) = found.flatten() {
                return Some(record);
            }
        }
        debug!(title, "no exact title match on any backend");
        None
    }

    /// Tier 4: id lookup on each backend in order
    async fn first_id_match(
        &self,
        raw_id: &str,
        backends: &[BackendDescriptor],
    ) -> Option<RawContentRecord> {
        for backend in backends {
            let found = self
                .bounded("id", self.lookup_id(&backend.endpoint_url, raw_id))
                .await
                .flatten();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Attach exact-title matches from every other backend
    async fn with_alternatives(
        &self,
        primary: RawContentRecord,
        backends: &[BackendDescriptor],
    ) -> ResolvedContent {
        let title = primary.title.clone();
        let others = backends
            .iter()
            .filter(|b| b.endpoint_url != primary.origin_endpoint);
        let found = join_all(others.map(|backend| {
            self.bounded("alternatives", self.exact_title(&backend.endpoint_url, &title))
        }))
        .await;

        let mut resolved = ResolvedContent::new(primary);
        for record in found.into_iter().flatten().flatten() {
            if !resolved.push_alternative(record) {
                debug!(title = %title, "duplicate alternative dropped");
            }
        }
        resolved
    }

    /// Aggregated keyword search
    ///
    /// Metadata suggestions come first, then catalog records from every
    /// enabled backend in registry order. Later hits whose title repeats an
    /// earlier one are dropped.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, keyword: &str) -> Vec<SearchHit> {
        let backends = self.inner.registry.list_enabled();
        let catalog = join_all(backends.iter().map(|backend| {
            self.bounded("search", self.search_backend(&backend.endpoint_url, keyword))
        }));
        let (suggested, batches) =
            tokio::join!(self.bounded("suggest", self.suggest(keyword)), catalog);

        let mut seen = HashSet::new();
        let records = batches.into_iter().flatten().flatten().map(SearchHit::from);
        suggested
            .into_iter()
            .flatten()
            .chain(records)
            .filter(|hit| seen.insert(normalize_title(&hit.title)))
            .collect()
    }

    async fn suggest(&self, keyword: &str) -> Vec<SearchHit> {
        match self.inner.metadata.suggest(keyword).await {
            Ok(hits) => hits.into_iter().map(SearchHit::from).collect(),
            Err(e) => {
                warn!(keyword, error = %e, "metadata suggest failed");
                Vec::new()
            }
        }
    }

    async fn search_backend(&self, endpoint: &str, keyword: &str) -> Vec<RawContentRecord> {
        match self.inner.catalog.search(endpoint, keyword).await {
            Ok(records) => records,
            Err(e) => {
                warn!(endpoint, keyword, error = %e, "backend search failed");
                Vec::new()
            }
        }
    }

    async fn exact_title(&self, endpoint: &str, title: &str) -> Option<RawContentRecord> {
        self.search_backend(endpoint, title)
            .await
            .into_iter()
            .find(|record| record.title == title)
    }

    async fn lookup_id(&self, endpoint: &str, raw_id: &str) -> Option<RawContentRecord> {
        match self.inner.catalog.detail_by_id(endpoint, raw_id).await {
            Ok(records) => records.into_iter().next(),
            Err(e) => {
                warn!(endpoint, id = raw_id, error = %e, "backend id lookup failed");
                None
            }
        }
    }

    /// Bound `work` by the tier timeout; a timeout yields `None`
    async fn bounded<T>(&self, tier: &str, work: impl Future<Output = T>) -> Option<T> {
        match tokio::time::timeout(self.inner.tier_timeout, work).await {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    tier,
                    timeout_ms = self.inner.tier_timeout.as_millis() as u64,
                    "resolution tier timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Gateway;
    use crate::store::MemoryStore;

    fn resolver_without_backends_reachable() -> ContentResolver {
        let gateway = Gateway::direct_only(Duration::from_millis(200));
        ContentResolver::new(
            CatalogClient::new(gateway.clone()),
            MetadataClient::with_base_url(gateway, "http://127.0.0.1:9"),
            SourceRegistry::new(MemoryStore::shared()),
            Duration::from_millis(300),
        )
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let resolver = resolver_without_backends_reachable();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            1
        };
        assert_eq!(resolver.bounded("test", slow).await, None);
        assert_eq!(resolver.bounded("test", async { 2 }).await, Some(2));
    }
}
