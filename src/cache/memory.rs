use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::CacheBackend;
use crate::error::CacheError;

/// Process-local cache. Never unavailable.
#[derive(Default)]
pub struct MemoryCacheBackend {
  data: RwLock<HashMap<String, String>>,
}

impl MemoryCacheBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start with a preloaded set of entries
  pub fn with_entries<I, K, V>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let data = entries
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    Self {
      data: RwLock::new(data),
    }
  }

  pub fn len(&self) -> usize {
    self.data.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.read().is_empty()
  }

  /// Copy of a single entry without going through the async trait
  pub fn peek(&self, key: &str) -> Option<String> {
    self.data.read().get(key).cloned()
  }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
    Ok(self.data.read().get(key).cloned())
  }

  async fn set(&self, key: &str, payload: &str) -> Result<(), CacheError> {
    self
      .data
      .write()
      .insert(key.to_string(), payload.to_string());
    Ok(())
  }

  async fn clear_all(&self) -> Result<(), CacheError> {
    self.data.write().clear();
    Ok(())
  }

  fn describe(&self) -> String {
    "memory".to_string()
  }
}
