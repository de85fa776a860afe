//! API clients for external services
//!
//! - Gateway: direct-then-relay HTTP access shared by every client
//! - Catalog: detail/search queries against catalog backends
//! - Douban: scraped metadata (suggest + subject pages)
//! - Danmaku: comment-track matching and comment fetch

pub mod catalog;
pub mod danmaku;
pub mod douban;
pub mod gateway;

pub use catalog::CatalogClient;
pub use danmaku::DanmakuClient;
pub use douban::MetadataClient;
pub use gateway::{Gateway, Payload, ProxyRelay};
