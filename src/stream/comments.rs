//! Comment-track matcher
//!
//! Resolves (title, episode) to a timed comment track on the comment backend.
//! Catalog titles are noisy ("《Show》 1080p 第03集"), so matching is layered:
//!
//! 1. Query the filename-match endpoint with a few virtual filenames built
//!    from the cleaned title, concurrently; first confident match wins.
//! 2. Fall back to title+episode search and take the first candidate.
//! 3. Fetch, normalize and cache the comments of the winning track.
//!
//! Misses are never cached so a later attempt can succeed once the backend
//! indexes the title.

use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::api::danmaku::{DanmakuClient, RawComment};
use crate::cache::TtlCache;
use crate::error::{Error, Result};
use crate::models::{normalize_title, CommentCacheEntry, CommentEvent, DisplayMode};

/// Store prefix of comment cache entries
pub const CACHE_PREFIX: &str = "cine_danmaku_";

/// Default cap on events kept per track
pub const DEFAULT_MAX_EVENTS: usize = 3000;

/// Cleaned title plus the episode number used for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub title: String,
    pub episode: u32,
}

impl SearchTerm {
    /// Build from a raw title and zero-based episode index
    ///
    /// An episode number embedded in the title ("第03集", "EP03") takes
    /// precedence over `episode_index + 1`.
    pub fn from_title(raw_title: &str, episode_index: usize) -> Self {
        let episode = embedded_episode(raw_title).unwrap_or(episode_index as u32 + 1);
        Self {
            title: clean_title(raw_title),
            episode,
        }
    }

    pub fn cache_key(&self) -> String {
        format!("{}_{}", normalize_title(&self.title), self.episode)
    }

    /// Filenames tried against the filename-match endpoint
    pub fn virtual_filenames(&self) -> Vec<String> {
        vec![
            format!("{} {:02}.mp4", self.title, self.episode),
            format!("{} - {:02}.mp4", self.title, self.episode),
            format!("{} 第{}集.mp4", self.title, self.episode),
        ]
    }
}

fn episode_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)第\s*(\d{1,4})\s*[集话話]|\bEP?\s*(\d{1,4})\b").expect("valid regex")
    })
}

fn noise_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // Bracketed metadata: [Group] 【中字】 (2023)
            r"\[[^\]]*\]|【[^】]*】|\([^)]*\)|（[^）]*）",
            // Episode markers
            r"(?i)第\s*\d{1,4}\s*[集话話]|\bEP?\s*\d{1,4}\b",
            // Resolutions
            r"(?i)\b\d{3,4}[pP]\b|\b[248][kK]\b|\bUHD\b|\bFHD\b|\bHD\b|蓝光|超清|高清|标清",
            // Technical tags
            r"(?i)\b(?:HEVC|AVC|x26[45]|h\.?26[45]|WEB-?DL|WEB-?Rip|BluRay|BDRip|HDR|AAC|FLAC|10bit|60fps|mp4|mkv)\b|国语|粤语|中字|双语|无删减|完整版|未删减",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

/// Episode number written into the title, if any
pub fn embedded_episode(title: &str) -> Option<u32> {
    let caps = episode_pattern().captures(title)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strip tags, bracketed metadata and resolution markers from a title
pub fn clean_title(title: &str) -> String {
    let unwrapped = title.replace(['《', '》'], " ");
    let stripped = noise_patterns()
        .iter()
        .fold(unwrapped, |acc, re| re.replace_all(&acc, " ").into_owned());
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key for a title+episode, keyed on the episode actually matched
pub fn match_key(title: &str, episode_index: usize) -> String {
    SearchTerm::from_title(title, episode_index).cache_key()
}

/// Decode packed comment records into events, sorted by time
pub fn normalize_comments(raw: Vec<RawComment>, max_events: usize) -> Vec<CommentEvent> {
    let mut events: Vec<CommentEvent> = raw
        .into_iter()
        .filter_map(normalize_comment)
        .take(max_events)
        .collect();
    events.sort_by(|a, b| a.time_offset_seconds.total_cmp(&b.time_offset_seconds));
    events
}

fn normalize_comment(raw: RawComment) -> Option<CommentEvent> {
    let text = raw.m.trim();
    if text.is_empty() {
        return None;
    }
    let mut fields = raw.p.split(',');
    let time: f64 = fields.next()?.trim().parse().ok()?;
    if !time.is_finite() || time < 0.0 {
        return None;
    }
    let mode = fields
        .next()
        .and_then(|m| m.trim().parse::<u8>().ok())
        .map(DisplayMode::from_code)
        .unwrap_or_default();
    let color = fields
        .next()
        .and_then(|c| c.trim().parse::<u32>().ok())
        .unwrap_or(0xFFFFFF);

    Some(CommentEvent {
        time_offset_seconds: time,
        display_mode: mode,
        color: format!("#{:06x}", color & 0xFFFFFF),
        text: text.to_string(),
    })
}

/// Layered comment-track matcher with TTL caching
#[derive(Clone)]
pub struct CommentMatcher {
    client: DanmakuClient,
    cache: TtlCache,
    max_events: usize,
}

impl CommentMatcher {
    pub fn new(client: DanmakuClient, cache: TtlCache) -> Self {
        Self {
            client,
            cache,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Comment events for a title+episode; empty when nothing matches
    pub async fn resolve(&self, title: &str, episode_index: usize) -> Vec<CommentEvent> {
        let term = SearchTerm::from_title(title, episode_index);
        let key = term.cache_key();
        if let Some(entry) = self.cache.get::<CommentCacheEntry>(&key) {
            debug!(key, track = entry.track_id, "comment cache hit");
            return entry.events;
        }

        let track_id = match self.match_track(&term).await {
            Ok(id) => id,
            Err(e) => {
                warn!(title, episode_index, error = %e, "comment track not found");
                return Vec::new();
            }
        };

        let raw = match self.client.comments(track_id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(track_id, error = %e, "comment fetch failed");
                return Vec::new();
            }
        };
        let events = normalize_comments(raw, self.max_events);
        info!(title, episode_index, track_id, count = events.len(), "comments loaded");

        let entry = CommentCacheEntry {
            match_key: key.clone(),
            track_id,
            events,
        };
        if let Err(e) = self.cache.put(&key, &entry) {
            warn!(key, error = %e, "comment cache write dropped");
        }
        entry.events
    }

    /// Run the matching tiers for `term`
    pub async fn match_track(&self, term: &SearchTerm) -> Result<u64> {
        if term.title.is_empty() {
            return Err(Error::NoCommentMatch("<empty title>".into()));
        }

        let mut attempts: FuturesUnordered<_> = term
            .virtual_filenames()
            .into_iter()
            .map(|name| async move {
                let result = self.client.match_file(&name).await;
                (name, result)
            })
            .collect();

        while let Some((name, result)) = attempts.next().await {
            match result {
                Ok(Some(track)) => {
                    debug!(file = %name, track, "filename matched");
                    return Ok(track);
                }
                Ok(None) => debug!(file = %name, "filename not matched"),
                Err(e) => debug!(file = %name, error = %e, "filename match failed"),
            }
        }

        match self.client.search_episode(&term.title, term.episode).await {
            Ok(Some(track)) => {
                debug!(title = %term.title, track, "search fallback matched");
                Ok(track)
            }
            Ok(None) => Err(Error::NoCommentMatch(format!("{} #{}", term.title, term.episode))),
            Err(e) => {
                debug!(title = %term.title, error = %e, "search fallback failed");
                Err(Error::NoCommentMatch(format!("{} #{}", term.title, term.episode)))
            }
        }
    }

    /// Forget every cached track
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}
