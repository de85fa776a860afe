//! Comment backend client
//!
//! Three endpoints: filename match, title+episode search, and comment fetch
//! by track id. Comments arrive packed as `p = "time,mode,color,uid"` plus
//! the text in `m`.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::api::gateway::Gateway;
use crate::error::{Error, Result};

pub const DEFAULT_COMMENT_API_URL: &str = "https://api.dandanplay.net";

/// Packed comment record as returned by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub cid: Option<u64>,
    pub p: String,
    pub m: String,
}

#[derive(Debug, Deserialize)]
struct MatchResponse {
    #[serde(rename = "isMatched", default)]
    is_matched: bool,
    #[serde(default)]
    matches: Vec<MatchItem>,
}

#[derive(Debug, Deserialize)]
struct MatchItem {
    #[serde(rename = "episodeId")]
    episode_id: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    animes: Vec<SearchAnime>,
}

#[derive(Debug, Deserialize)]
struct SearchAnime {
    #[serde(default)]
    episodes: Vec<SearchEpisode>,
}

#[derive(Debug, Deserialize)]
struct SearchEpisode {
    #[serde(rename = "episodeId")]
    episode_id: u64,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    #[serde(default)]
    comments: Vec<RawComment>,
}

/// Comment backend client
#[derive(Clone)]
pub struct DanmakuClient {
    gateway: Gateway,
    base_url: String,
}

impl DanmakuClient {
    pub fn new(gateway: Gateway) -> Self {
        Self::with_base_url(gateway, DEFAULT_COMMENT_API_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(gateway: Gateway, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let value = self
            .gateway
            .fetch(url)
            .await?
            .into_json()
            .ok_or_else(|| Error::MalformedResponse(format!("non-JSON body from {}", url)))?;
        serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("JSON shape error: {}", e)))
    }

    /// Ask the backend to identify a file by name
    ///
    /// Returns the track id only for a confident (matched) answer.
    #[instrument(skip(self), level = "debug")]
    pub async fn match_file(&self, file_name: &str) -> Result<Option<u64>> {
        let url = format!(
            "{}/api/v2/match?fileName={}",
            self.base_url,
            urlencoding::encode(file_name)
        );
        let response: MatchResponse = self.get(&url).await?;
        let track = if response.is_matched {
            response.matches.first().map(|m| m.episode_id)
        } else {
            None
        };
        debug!(file_name, ?track, "filename match");
        Ok(track)
    }

    /// Title+episode search; first candidate's first episode wins
    #[instrument(skip(self), level = "debug")]
    pub async fn search_episode(&self, title: &str, episode: u32) -> Result<Option<u64>> {
        let url = format!(
            "{}/api/v2/search/episodes?anime={}&episode={}",
            self.base_url,
            urlencoding::encode(title),
            episode
        );
        let response: SearchResponse = self.get(&url).await?;
        Ok(response
            .animes
            .first()
            .and_then(|a| a.episodes.first())
            .map(|e| e.episode_id))
    }

    /// Packed comments for a track
    #[instrument(skip(self), level = "debug")]
    pub async fn comments(&self, track_id: u64) -> Result<Vec<RawComment>> {
        let url = format!(
            "{}/api/v2/comment/{}?withRelated=true",
            self.base_url, track_id
        );
        let response: CommentResponse = self.get(&url).await?;
        Ok(response.comments)
    }
}
