//! Cache backends consulted by the proxy
//!
//! The proxy only sees the [`CacheBackend`] trait. Two implementations:
//! - [`RedisCacheBackend`]: external Redis server over one long-lived session
//! - [`MemoryCacheBackend`]: process-local map

mod backend;
mod memory;
mod redis_backend;

use std::sync::Arc;

pub use self::backend::CacheBackend;
pub use self::memory::MemoryCacheBackend;
pub use self::redis_backend::RedisCacheBackend;

use crate::config::{CacheMode, CacheSection};

/// Build the backend selected by `cache.mode`. Never connects eagerly.
pub fn from_config(config: &CacheSection) -> Result<Arc<dyn CacheBackend>, anyhow::Error> {
  let backend: Arc<dyn CacheBackend> = match config.mode {
    CacheMode::Redis => Arc::new(RedisCacheBackend::new(config)?),
    CacheMode::Memory => Arc::new(MemoryCacheBackend::new()),
  };
  tracing::info!("Cache backend: {}", backend.describe());
  Ok(backend)
}
