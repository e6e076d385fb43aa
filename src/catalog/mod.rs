//! Read-only catalog consulted by the origin

mod sqlite;

use async_trait::async_trait;

pub use self::sqlite::SqliteCatalog;

use crate::error::CatalogError;

/// Exact-match lookup of a payload by key
#[async_trait]
pub trait CatalogStore: Send + Sync {
  /// `Ok(None)` when no row matches
  async fn lookup(&self, key: &str) -> Result<Option<String>, CatalogError>;
}
