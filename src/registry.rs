//! Catalog backend registry
//!
//! Persisted list of catalog backends under `cine_vod_sources`. The built-in
//! default backend is always present, always first and always enabled; it
//! cannot be removed or toggled off.

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::BackendDescriptor;
use crate::store::{self, SharedStore, StoreError};

pub const SOURCES_KEY: &str = "cine_vod_sources";
pub const DEFAULT_BACKEND_ID: &str = "default";
pub const DEFAULT_BACKEND_NAME: &str = "Default";
pub const DEFAULT_BACKEND_URL: &str = "https://caiji.dyttzyapi.com/api.php/provide/vod";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No backend with id {0}")]
    NotFound(String),

    #[error("Backend {0} is built in and cannot be changed")]
    Protected(String),

    #[error("Invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Could not persist backends: {0}")]
    Store(#[from] StoreError),
}

/// The built-in backend
pub fn default_backend() -> BackendDescriptor {
    BackendDescriptor {
        id: DEFAULT_BACKEND_ID.to_string(),
        display_name: DEFAULT_BACKEND_NAME.to_string(),
        endpoint_url: DEFAULT_BACKEND_URL.to_string(),
        enabled: true,
    }
}

/// Store-backed list of catalog backends
#[derive(Clone)]
pub struct SourceRegistry {
    store: SharedStore,
    default: BackendDescriptor,
}

impl SourceRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self::with_default(store, default_backend())
    }

    /// Registry whose protected backend is `default` (always kept enabled)
    pub fn with_default(store: SharedStore, mut default: BackendDescriptor) -> Self {
        default.enabled = true;
        Self { store, default }
    }

    pub fn default_backend(&self) -> &BackendDescriptor {
        &self.default
    }

    /// Every backend in registry order, default first
    pub fn list_all(&self) -> Vec<BackendDescriptor> {
        let stored: Vec<BackendDescriptor> =
            store::get_json(self.store.as_ref(), SOURCES_KEY).unwrap_or_default();

        let mut backends = vec![self.default.clone()];
        backends.extend(stored.into_iter().filter(|b| {
            b.id != self.default.id && b.endpoint_url != self.default.endpoint_url
        }));
        backends
    }

    /// Enabled backends in registry order; never empty
    pub fn list_enabled(&self) -> Vec<BackendDescriptor> {
        self.list_all().into_iter().filter(|b| b.enabled).collect()
    }

    pub fn get(&self, id: &str) -> Option<BackendDescriptor> {
        self.list_all().into_iter().find(|b| b.id == id)
    }

    /// Register a new enabled backend
    pub fn add(&self, name: &str, endpoint: &str) -> Result<BackendDescriptor, RegistryError> {
        let endpoint = endpoint.trim();
        let valid = Url::parse(endpoint)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(RegistryError::InvalidEndpoint(endpoint.to_string()));
        }

        let name = name.trim();
        let backend = BackendDescriptor {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: if name.is_empty() { endpoint.to_string() } else { name.to_string() },
            endpoint_url: endpoint.to_string(),
            enabled: true,
        };

        let mut backends = self.list_all();
        backends.push(backend.clone());
        self.persist(&backends)?;
        info!(id = %backend.id, endpoint = %backend.endpoint_url, "backend added");
        Ok(backend)
    }

    pub fn remove(&self, id: &str) -> Result<BackendDescriptor, RegistryError> {
        self.guard_default(id)?;
        let mut backends = self.list_all();
        let position = backends
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let removed = backends.remove(position);
        self.persist(&backends)?;
        info!(id, "backend removed");
        Ok(removed)
    }

    /// Flip a backend's enabled flag, returning the new state
    pub fn toggle(&self, id: &str) -> Result<bool, RegistryError> {
        self.guard_default(id)?;
        let mut backends = self.list_all();
        let backend = backends
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        backend.enabled = !backend.enabled;
        let enabled = backend.enabled;
        self.persist(&backends)?;
        debug!(id, enabled, "backend toggled");
        Ok(enabled)
    }

    /// Drop every custom backend
    pub fn reset(&self) -> Vec<BackendDescriptor> {
        self.store.remove(SOURCES_KEY);
        info!("backends reset to default");
        self.list_all()
    }

    fn persist(&self, backends: &[BackendDescriptor]) -> Result<(), RegistryError> {
        store::set_json(self.store.as_ref(), SOURCES_KEY, &backends)?;
        Ok(())
    }

    fn guard_default(&self, id: &str) -> Result<(), RegistryError> {
        if id == self.default.id {
            return Err(RegistryError::Protected(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(MemoryStore::shared())
    }

    #[test]
    fn test_default_backend_always_present() {
        let registry = registry();
        let all = registry.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, DEFAULT_BACKEND_ID);
        assert_eq!(registry.list_enabled().len(), 1);
    }

    #[test]
    fn test_add_toggle_remove() {
        let registry = registry();
        let added = registry.add(" Mirror ", "https://mirror.example/api.php/provide/vod").unwrap();
        assert_eq!(added.display_name, "Mirror");
        assert_eq!(registry.list_enabled().len(), 2);

        assert!(!registry.toggle(&added.id).unwrap());
        assert_eq!(registry.list_enabled().len(), 1);
        assert_eq!(registry.list_all().len(), 2);

        registry.remove(&added.id).unwrap();
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn test_default_is_protected() {
        let registry = registry();
        assert!(matches!(
            registry.remove(DEFAULT_BACKEND_ID),
            Err(RegistryError::Protected(_))
        ));
        assert!(matches!(
            registry.toggle(DEFAULT_BACKEND_ID),
            Err(RegistryError::Protected(_))
        ));
    }

    #[test]
    fn test_unknown_and_invalid() {
        let registry = registry();
        assert!(matches!(registry.remove("nope"), Err(RegistryError::NotFound(_))));
        assert!(matches!(
            registry.add("x", "ftp://nope"),
            Err(RegistryError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            registry.add("x", "not a url"),
            Err(RegistryError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_reset_keeps_only_default() {
        let registry = registry();
        registry.add("a", "https://a.example/api").unwrap();
        registry.add("b", "https://b.example/api").unwrap();
        assert_eq!(registry.reset().len(), 1);
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn test_custom_default_forced_enabled() {
        let mut custom = default_backend();
        custom.id = "local".into();
        custom.endpoint_url = "http://127.0.0.1:1/api".into();
        custom.enabled = false;
        let registry = SourceRegistry::with_default(MemoryStore::shared(), custom);
        let enabled = registry.list_enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "local");
        assert!(matches!(registry.remove("local"), Err(RegistryError::Protected(_))));
    }

    #[test]
    fn test_registry_order_preserved() {
        let registry = registry();
        let a = registry.add("a", "https://a.example/api").unwrap();
        let b = registry.add("b", "https://b.example/api").unwrap();
        let ids: Vec<String> = registry.list_all().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![DEFAULT_BACKEND_ID.to_string(), a.id, b.id]);
    }
}
