//! Packed playlist decoder
//!
//! Catalog backends pack every play source of a title into two strings:
//!
//! ```text
//! names: "group A$$$group B"
//! urls:  "ep1$url1#ep2$url2$$$ep1$url1"
//! ```
//!
//! Groups are paired by position. Only groups whose name carries the stream
//! format marker are kept. Decoding never fails; bad input yields fewer
//! episodes.

use crate::models::{Episode, PlaySource};

pub const GROUP_SEPARATOR: &str = "$$$";
pub const EPISODE_SEPARATOR: char = '#';
pub const TITLE_URL_SEPARATOR: char = '$';

/// Group-name marker of a supported stream format (case-insensitive)
pub const STREAM_FORMAT_MARKER: &str = "m3u8";

/// Decode packed group names and payloads into play sources
pub fn decode(packed_names: &str, packed_urls: &str) -> Vec<PlaySource> {
    packed_names
        .split(GROUP_SEPARATOR)
        .zip(packed_urls.split(GROUP_SEPARATOR))
        .filter(|(name, _)| is_supported_group(name))
        .filter_map(|(name, payload)| {
            let episodes = decode_group(payload);
            (!episodes.is_empty()).then(|| PlaySource {
                group_name: name.trim().to_string(),
                episodes,
            })
        })
        .collect()
}

fn is_supported_group(name: &str) -> bool {
    name.to_lowercase().contains(STREAM_FORMAT_MARKER)
}

fn decode_group(payload: &str) -> Vec<Episode> {
    payload
        .split(EPISODE_SEPARATOR)
        .enumerate()
        .filter_map(|(position, token)| decode_episode(position, token))
        .enumerate()
        .map(|(index, (title, url))| Episode { title, url, index })
        .collect()
}

/// `title$url`, or a bare url that gets an ordinal title
fn decode_episode(position: usize, token: &str) -> Option<(String, String)> {
    let token = token.trim();
    let (title, url) = match token.split_once(TITLE_URL_SEPARATOR) {
        Some((title, url)) => (title.trim().to_string(), url.trim()),
        None => (format!("Episode {}", position + 1), token),
    };
    is_network_url(url).then(|| (title, url.to_string()))
}

fn is_network_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}
