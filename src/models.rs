//! Data structures and types for CineStream
//!
//! Contains all shared models used across the crate organized by domain:
//! - **Backends**: catalog backend descriptors and content identifiers
//! - **Content**: normalized catalog records and resolution results
//! - **Playlist**: decoded play sources and episodes
//! - **Comments**: timed comment events and cache entries
//! - **Playback**: checkpoints, skip policy and watch history

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Backend Models
// =============================================================================

/// A catalog backend as stored in the source registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub display_name: String,
    pub endpoint_url: String,
    pub enabled: bool,
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "on" } else { "off" };
        write!(f, "{} [{}] {}", self.display_name, state, self.endpoint_url)
    }
}

/// Where a content identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OriginHint {
    /// Id issued by one of the catalog backends
    #[default]
    Catalog,
    /// Id issued by the scraped metadata source
    Scraped,
}

/// Prefix that marks ids handed out by catalog backends in search results
pub const CATALOG_ID_PREFIX: &str = "cms_";

/// Identifier supplied by the caller for one resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIdentifier {
    pub raw_id: String,
    pub origin: OriginHint,
    pub endpoint_hint: Option<String>,
    pub title_hint: Option<String>,
}

impl ContentIdentifier {
    pub fn new(raw_id: impl Into<String>, origin: OriginHint) -> Self {
        Self {
            raw_id: raw_id.into(),
            origin,
            endpoint_hint: None,
            title_hint: None,
        }
    }

    /// Parse an id as it appears in aggregated search output
    ///
    /// `cms_123` is a catalog id, anything else is treated as a scraped id.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(CATALOG_ID_PREFIX) {
            Some(id) => Self::new(id, OriginHint::Catalog),
            None => Self::new(raw, OriginHint::Scraped),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_hint = Some(endpoint.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }

    /// Key used to collapse concurrent resolutions of the same request
    pub fn flight_key(&self) -> String {
        format!(
            "{:?}|{}|{}|{}",
            self.origin,
            self.raw_id,
            self.endpoint_hint.as_deref().unwrap_or(""),
            self.title_hint.as_deref().unwrap_or("")
        )
    }
}

// =============================================================================
// Content Models
// =============================================================================

/// A catalog record after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContentRecord {
    pub id: String,
    pub title: String,
    pub poster_url: String,
    pub synopsis: String,
    pub director: String,
    pub cast: String,
    pub packed_source_names: String,
    pub packed_source_urls: String,
    pub origin_endpoint: String,
    pub score_or_rank: Option<String>,
}

impl RawContentRecord {
    /// Map an arbitrary backend JSON object onto the canonical record
    ///
    /// Backends disagree on field names, and on whether ids are numbers or
    /// strings. Returns `None` when no usable id or title is present.
    pub fn from_value(value: &Value, origin_endpoint: &str) -> Option<Self> {
        let id = pick_string(value, &["vod_id", "id"])?;
        let title = pick_string(value, &["vod_name", "title", "name"])?;

        Some(Self {
            id,
            title,
            poster_url: pick_string(value, &["vod_pic", "poster", "pic"]).unwrap_or_default(),
            synopsis: pick_string(value, &["vod_content", "vod_blurb", "content"])
                .unwrap_or_default(),
            director: pick_string(value, &["vod_director", "director"]).unwrap_or_default(),
            cast: pick_string(value, &["vod_actor", "actor", "cast"]).unwrap_or_default(),
            packed_source_names: pick_string(value, &["vod_play_from", "play_from"])
                .unwrap_or_default(),
            packed_source_urls: pick_string(value, &["vod_play_url", "play_url"])
                .unwrap_or_default(),
            origin_endpoint: origin_endpoint.to_string(),
            score_or_rank: pick_string(value, &["vod_score", "vod_douban_score", "score"]),
        })
    }

    /// Id as handed out in search results (`cms_<id>`)
    pub fn catalog_id(&self) -> String {
        format!("{}{}", CATALOG_ID_PREFIX, self.id)
    }
}

/// First non-blank string (or number rendered as string) among `keys`
fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Normalize a title for duplicate detection (case and whitespace insensitive)
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Result of resolving one identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContent {
    pub primary: RawContentRecord,
    pub alternatives: Vec<RawContentRecord>,
}

impl ResolvedContent {
    pub fn new(primary: RawContentRecord) -> Self {
        Self {
            primary,
            alternatives: Vec::new(),
        }
    }

    /// Add an alternative unless its title collides with one already held
    ///
    /// Returns whether the record was kept.
    pub fn push_alternative(&mut self, record: RawContentRecord) -> bool {
        let key = normalize_title(&record.title);
        let taken = normalize_title(&self.primary.title) == key
            || self
                .alternatives
                .iter()
                .any(|alt| normalize_title(&alt.title) == key);
        if taken {
            return false;
        }
        self.alternatives.push(record);
        true
    }
}

/// One entry of an aggregated search
///
/// `id` is accepted as-is by [`ContentIdentifier::parse`]: catalog hits
/// carry the `cms_` prefix, metadata hits the scraped id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub year: Option<String>,
    pub origin: OriginHint,
    /// Backend holding the record (catalog hits only)
    #[serde(default)]
    pub origin_endpoint: Option<String>,
}

impl From<RawContentRecord> for SearchHit {
    fn from(record: RawContentRecord) -> Self {
        Self {
            id: record.catalog_id(),
            title: record.title,
            poster_url: record.poster_url,
            year: None,
            origin: OriginHint::Catalog,
            origin_endpoint: Some(record.origin_endpoint),
        }
    }
}

impl SearchHit {
    /// Identifier that resolves this hit, pinned to its backend when known
    pub fn identifier(&self) -> ContentIdentifier {
        let id = ContentIdentifier::parse(&self.id).with_title(self.title.as_str());
        match &self.origin_endpoint {
            Some(endpoint) => id.with_endpoint(endpoint.as_str()),
            None => id,
        }
    }
}

// =============================================================================
// Playlist Models
// =============================================================================

/// One playable episode inside a play source group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    pub url: String,
    pub index: usize,
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index + 1, self.title)
    }
}

/// A named group of episodes from one packed play source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySource {
    pub group_name: String,
    pub episodes: Vec<Episode>,
}

impl PlaySource {
    /// Episodes in display order; reversal never touches `index`
    pub fn episodes_view(&self, reversed: bool) -> Vec<&Episode> {
        if reversed {
            self.episodes.iter().rev().collect()
        } else {
            self.episodes.iter().collect()
        }
    }

    pub fn episode(&self, index: usize) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.index == index)
    }
}

// =============================================================================
// Comment Models
// =============================================================================

/// How a comment travels across the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Scroll,
    Top,
    Bottom,
}

impl DisplayMode {
    /// Map the backend's numeric mode code
    pub fn from_code(code: u8) -> Self {
        match code {
            4 => DisplayMode::Bottom,
            5 => DisplayMode::Top,
            _ => DisplayMode::Scroll,
        }
    }
}

/// One timed comment on the overlay track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentEvent {
    pub time_offset_seconds: f64,
    pub display_mode: DisplayMode,
    pub color: String,
    pub text: String,
}

/// Cached outcome of a successful comment-track match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentCacheEntry {
    pub match_key: String,
    pub track_id: u64,
    pub events: Vec<CommentEvent>,
}

// =============================================================================
// Playback Models
// =============================================================================

/// Last watched position for one content+episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub key: String,
    pub position_seconds: f64,
}

/// Global skip-intro/skip-outro preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkipPolicy {
    pub intro_seconds: u32,
    pub outro_seconds: u32,
}

impl fmt::Display for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skip intro {}s, skip outro {}s",
            self.intro_seconds, self.outro_seconds
        )
    }
}

/// Recently watched entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub content_id: String,
    pub title: String,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub origin_endpoint: Option<String>,
    pub episode_index: usize,
    pub episode_title: String,
    /// Unix millis
    pub last_updated: u64,
}

// =============================================================================
// Tests
// =============================================================================
