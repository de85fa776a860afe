//! Watch history
//!
//! Most-recent-first list of watched titles, one entry per content id,
//! capped at [`MAX_ENTRIES`]. The last episode opened per content lives
//! under its own key and is not evicted with the list.

use tracing::warn;

use crate::cache::now_millis;
use crate::models::HistoryItem;
use crate::store::{self, SharedStore};

pub const HISTORY_KEY: &str = "cine_watch_history";
pub const MAX_ENTRIES: usize = 20;
pub const LAST_EPISODE_PREFIX: &str = "cine_last_episode_";

fn last_episode_key(content_id: &str) -> String {
    format!("{}{}", LAST_EPISODE_PREFIX, content_id)
}

#[derive(Clone)]
pub struct WatchHistory {
    store: SharedStore,
}

impl WatchHistory {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<HistoryItem> {
        store::get_json(self.store.as_ref(), HISTORY_KEY).unwrap_or_default()
    }

    /// Put `item` at the front, replacing any older entry for the same content
    pub fn add(&self, mut item: HistoryItem) -> Vec<HistoryItem> {
        if item.last_updated == 0 {
            item.last_updated = now_millis();
        }
        let mut items = self.list();
        items.retain(|h| h.content_id != item.content_id);
        items.insert(0, item);
        items.truncate(MAX_ENTRIES);
        self.persist(&items);
        items
    }

    pub fn remove(&self, content_id: &str) -> Vec<HistoryItem> {
        let mut items = self.list();
        items.retain(|h| h.content_id != content_id);
        self.persist(&items);
        items
    }

    pub fn clear(&self) {
        self.store.remove(HISTORY_KEY);
    }

    /// Episode index last opened for `content_id`
    pub fn last_episode(&self, content_id: &str) -> Option<usize> {
        store::get_json(self.store.as_ref(), &last_episode_key(content_id))
    }

    pub fn remember_episode(&self, content_id: &str, episode_index: usize) {
        let key = last_episode_key(content_id);
        if let Err(e) = store::set_json(self.store.as_ref(), &key, &episode_index) {
            warn!(key, error = %e, "last episode write dropped");
        }
    }

    fn persist(&self, items: &[HistoryItem]) {
        if let Err(e) = store::set_json(self.store.as_ref(), HISTORY_KEY, &items) {
            warn!(error = %e, "history write dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn item(id: &str, episode: usize) -> HistoryItem {
        HistoryItem {
            content_id: id.to_string(),
            title: format!("Title {}", id),
            poster_url: String::new(),
            origin_endpoint: None,
            episode_index: episode,
            episode_title: format!("Episode {}", episode + 1),
            last_updated: 0,
        }
    }

    #[test]
    fn test_add_moves_to_front_and_dedups() {
        let history = WatchHistory::new(MemoryStore::shared());
        history.add(item("a", 0));
        history.add(item("b", 0));
        let items = history.add(item("a", 4));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content_id, "a");
        assert_eq!(items[0].episode_index, 4);
        assert!(items[0].last_updated > 0);
    }

    #[test]
    fn test_capped() {
        let history = WatchHistory::new(MemoryStore::shared());
        for i in 0..25 {
            history.add(item(&i.to_string(), 0));
        }
        let items = history.list();
        assert_eq!(items.len(), MAX_ENTRIES);
        assert_eq!(items[0].content_id, "24");
    }

    #[test]
    fn test_last_episode_per_content() {
        let history = WatchHistory::new(MemoryStore::shared());
        assert_eq!(history.last_episode("cms_1"), None);
        history.remember_episode("cms_1", 3);
        history.remember_episode("cms_2", 0);
        history.remember_episode("cms_1", 5);
        assert_eq!(history.last_episode("cms_1"), Some(5));
        assert_eq!(history.last_episode("cms_2"), Some(0));

        // Survives clearing the list
        history.clear();
        assert_eq!(history.last_episode("cms_1"), Some(5));
    }

    #[test]
    fn test_remove_and_clear() {
        let history = WatchHistory::new(MemoryStore::shared());
        history.add(item("a", 0));
        history.add(item("b", 0));
        assert_eq!(history.remove("a").len(), 1);
        history.clear();
        assert!(history.list().is_empty());
    }
}
