//! Error types shared by the proxy and origin services

use thiserror::Error;

/// Cache backend failure. Always recoverable: callers degrade to the origin.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
  #[error("cache backend unavailable: {0}")]
  Unavailable(String),
}

/// Origin fetch failure as seen by the proxy
#[derive(Debug, Clone, Error)]
pub enum OriginError {
  #[error("origin {addr} unreachable: {reason}")]
  Unreachable { addr: String, reason: String },
}

/// Catalog lookup failure on the origin side
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
  /// The store could not be opened (missing file, permissions, corrupt header)
  #[error("catalog unavailable: {0}")]
  Unavailable(String),
  /// The store opened but the lookup query failed
  #[error("catalog query failed: {0}")]
  Query(String),
}

/// Listener bind failure
#[derive(Debug, Error)]
pub enum BindError {
  #[error("failed to bind {addr} after {attempts} attempts: address in use")]
  Exhausted { addr: String, attempts: u32 },
  #[error("failed to bind {addr}: {source}")]
  Io {
    addr: String,
    #[source]
    source: std::io::Error,
  },
}

/// Framing failure on a single-message exchange
#[derive(Debug, Error)]
pub enum WireError {
  #[error("peer closed the connection before sending a message")]
  Closed,
  #[error("timed out waiting for peer")]
  Timeout,
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
