use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::OriginSection;
use crate::error::OriginError;
use crate::wire;

/// Source of truth behind the proxy
#[async_trait]
pub trait Origin: Send + Sync {
  async fn fetch(&self, key: &str) -> Result<String, OriginError>;
}

/// Opens a fresh connection to the origin listener for every fetch
#[derive(Debug, Clone)]
pub struct OriginClient {
  addr: String,
  connect_timeout: Duration,
  io_timeout: Duration,
}

impl OriginClient {
  pub fn new(addr: impl Into<String>, connect_timeout: Duration, io_timeout: Duration) -> Self {
    Self {
      addr: addr.into(),
      connect_timeout,
      io_timeout,
    }
  }

  pub fn from_config(config: &OriginSection) -> Self {
    Self::new(
      format!("{}:{}", config.host, config.port),
      config.connect_timeout(),
      config.io_timeout(),
    )
  }

  pub fn addr(&self) -> &str {
    &self.addr
  }

  fn unreachable(&self, reason: impl ToString) -> OriginError {
    OriginError::Unreachable {
      addr: self.addr.clone(),
      reason: reason.to_string(),
    }
  }
}

#[async_trait]
impl Origin for OriginClient {
  async fn fetch(&self, key: &str) -> Result<String, OriginError> {
    let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
      .await
      .map_err(|_| self.unreachable("connect timed out"))?
      .map_err(|e| self.unreachable(e))?;
    tracing::debug!("Connected to origin {}", self.addr);

    // Stream is dropped (closed) on every path out of here
    wire::with_timeout(self.io_timeout, wire::exchange(&mut stream, key))
      .await
      .map_err(|e| self.unreachable(e))
  }
}
