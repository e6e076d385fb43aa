use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, OpenFlags, OptionalExtension};
use std::path::PathBuf;
use tokio_rusqlite::Connection;

use super::CatalogStore;
use crate::config::CatalogSection;
use crate::error::CatalogError;

/// SQLite-backed catalog.
///
/// The database is opened read-only for each lookup and closed before the
/// result is returned, so the file can be replaced while the origin runs.
pub struct SqliteCatalog {
  path: PathBuf,
  query: String,
}

/// Quote an SQL identifier, doubling embedded quotes
fn quote_identifier(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteCatalog {
  pub fn new(config: &CatalogSection) -> Self {
    let query = format!(
      "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1",
      quote_identifier(&config.value_column),
      quote_identifier(&config.table),
      quote_identifier(&config.key_column),
    );
    Self {
      path: PathBuf::from(&config.path),
      query,
    }
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  async fn open(&self) -> Result<Connection, CatalogError> {
    Connection::open_with_flags(
      &self.path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await
    .map_err(|e| CatalogError::Unavailable(format!("{}: {}", self.path.display(), e)))
  }
}

/// Render whatever the payload column holds as text. NULL counts as no payload.
fn payload_text(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::Integer(i) => Some(i.to_string()),
    Value::Real(f) => Some(f.to_string()),
    Value::Text(s) => Some(s),
    Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
  }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
  async fn lookup(&self, key: &str) -> Result<Option<String>, CatalogError> {
    let conn = self.open().await?;
    tracing::debug!("Opened catalog {}", self.path.display());

    let sql = self.query.clone();
    let key = key.to_string();
    let result = conn
      .call(move |conn| {
        let value = conn
          .query_row(&sql, params![key], |row| row.get::<_, Value>(0))
          .optional()?;
        Ok(value)
      })
      .await
      .map_err(|e| CatalogError::Query(e.to_string()));

    if let Err(e) = conn.close().await {
      tracing::warn!("Failed to close catalog {}: {}", self.path.display(), e);
    }

    Ok(result?.and_then(payload_text))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_quotes_identifiers() {
    let catalog = SqliteCatalog::new(&CatalogSection::default());
    assert_eq!(
      catalog.query(),
      r#"SELECT "Video Data" FROM "videos" WHERE "Video Title" = ?1 LIMIT 1"#
    );
  }

  #[test]
  fn test_quote_identifier_escapes() {
    assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
  }

  #[test]
  fn test_payload_text() {
    assert_eq!(payload_text(Value::Null), None);
    assert_eq!(payload_text(Value::Integer(7)).as_deref(), Some("7"));
    assert_eq!(
      payload_text(Value::Text("video1.mp4".into())).as_deref(),
      Some("video1.mp4")
    );
  }
}
