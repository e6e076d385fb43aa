//! Redis cache backend for connecting to an external Redis server

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

use super::CacheBackend;
use crate::config::CacheSection;
use crate::error::CacheError;

/// One long-lived Redis session shared by every request.
///
/// The session is opened on first use with a single connection attempt. If
/// opening fails the operation reports [`CacheError::Unavailable`] and the next
/// operation tries again. Once open, a dropped connection is replaced by one
/// background reconnect attempt; the failing call is not retried.
pub struct RedisCacheBackend {
  client: Client,
  connection: Mutex<Option<ConnectionManager>>,
  timeout: Duration,
  target: String,
}

impl RedisCacheBackend {
  /// Parses the connection URL only; no network traffic happens here
  pub fn new(config: &CacheSection) -> Result<Self, redis::RedisError> {
    let client = Client::open(config.connection_url())?;
    Ok(Self {
      client,
      connection: Mutex::new(None),
      timeout: config.timeout(),
      target: format!("redis {}:{}/{}", config.host, config.port, config.database),
    })
  }

  async fn connection(&self) -> Result<ConnectionManager, CacheError> {
    let mut slot = self.connection.lock().await;
    if let Some(conn) = slot.as_ref() {
      return Ok(conn.clone());
    }

    let config = ConnectionManagerConfig::new()
      .set_number_of_retries(0)
      .set_connection_timeout(self.timeout);
    let conn = ConnectionManager::new_with_config(self.client.clone(), config)
      .await
      .map_err(|e| CacheError::Unavailable(format!("{}: {}", self.target, e)))?;
    tracing::info!("Connected to {}", self.target);
    *slot = Some(conn.clone());
    Ok(conn)
  }

  /// Run one command, bounding connect + round trip by the configured timeout
  async fn run<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
  where
    F: FnOnce(ConnectionManager) -> Fut,
    Fut: Future<Output = RedisResult<T>>,
  {
    let attempt = async {
      let conn = self.connection().await?;
      op(conn)
        .await
        .map_err(|e| CacheError::Unavailable(format!("{}: {}", self.target, e)))
    };

    tokio::time::timeout(self.timeout, attempt)
      .await
      .map_err(|_| {
        CacheError::Unavailable(format!(
          "{}: timed out after {}ms",
          self.target,
          self.timeout.as_millis()
        ))
      })?
  }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
    self
      .run(|mut conn| async move {
        let value: Option<String> = conn.get(key).await?;
        Ok::<_, redis::RedisError>(value)
      })
      .await
  }

  async fn set(&self, key: &str, payload: &str) -> Result<(), CacheError> {
    self
      .run(|mut conn| async move {
        let _: () = conn.set(key, payload).await?;
        Ok::<_, redis::RedisError>(())
      })
      .await
  }

  async fn clear_all(&self) -> Result<(), CacheError> {
    self
      .run(|mut conn| async move {
        redis::cmd("FLUSHDB")
          .query_async::<()>(&mut conn)
          .await
      })
      .await
  }

  fn describe(&self) -> String {
    self.target.clone()
  }
}
