use async_trait::async_trait;

use crate::error::CacheError;

/// Keyed payload store with no expiry.
///
/// Every call reaches the backend at most once; nothing is retried here.
/// `Ok(None)` means the key is absent, `Err` means the backend could not answer.
#[async_trait]
pub trait CacheBackend: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

  /// Last write wins
  async fn set(&self, key: &str, payload: &str) -> Result<(), CacheError>;

  /// Remove every entry
  async fn clear_all(&self) -> Result<(), CacheError>;

  /// Human-readable target for logs
  fn describe(&self) -> String;
}
