//! Caching proxy for a video catalog lookup service.
//!
//! A client sends a key; the proxy answers from the cache when it can and
//! otherwise asks the origin, which looks the key up in a SQLite catalog.
//! The answer is written back to the cache on the way out.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod net;
pub mod origin;
pub mod proxy;
pub mod service;
pub mod wire;

pub use cache::{CacheBackend, MemoryCacheBackend, RedisCacheBackend};
pub use catalog::{CatalogStore, SqliteCatalog};
pub use config::VidcacheConfig;
pub use error::{BindError, CacheError, CatalogError, OriginError, WireError};
pub use origin::{Origin, OriginClient, OriginServer};
pub use proxy::ProxyServer;
