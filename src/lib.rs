//! CineStream - resilient catalog resolution and stream cleanup
//!
//! Finds a playable stream and its comment overlay across catalog backends
//! that are unreliable and disagree on schema.
//!
//! # Modules
//!
//! - `api` - Network gateway and backend clients (catalog, metadata, comments)
//! - `stream` - Playlist decoder, manifest sanitizer, comment matcher, playback
//! - `resolver` - Cross-backend content resolution with single-flight
//! - `registry` - Persisted catalog backend list
//! - `store` / `cache` - Durable key/value store and TTL cache service
//! - `app` - Service wiring from config
//! - `cli` / `commands` - Scriptable command line

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod singleflight;
pub mod store;
pub mod stream;

// Re-export commonly used types
pub use models::{
    BackendDescriptor, CommentEvent, ContentIdentifier, Episode, OriginHint, PlaySource,
    RawContentRecord, ResolvedContent, SearchHit, SkipPolicy,
};

pub use api::{CatalogClient, DanmakuClient, Gateway, MetadataClient};
pub use app::App;
pub use error::{Error, Result};
pub use resolver::ContentResolver;
pub use stream::{CommentMatcher, ManifestSanitizer};
