//! Playback-side pipeline
//!
//! - Playlist: packed play-source decoder
//! - Manifest: HLS ad-segment sanitizer
//! - Comments: comment-track matcher with TTL cache
//! - Playback: checkpoints, skip policy and auto-advance

pub mod comments;
pub mod manifest;
pub mod playback;
pub mod playlist;

pub use comments::CommentMatcher;
pub use manifest::ManifestSanitizer;
pub use playback::{CheckpointStore, PlaybackAction, PlaybackSession};
