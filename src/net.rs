//! Listener setup and process signals

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::BindSection;
use crate::error::BindError;

/// Bind `addr`, retrying while the address is still held by a previous instance.
///
/// Only `AddrInUse` is retried. Any other error fails immediately. The delay is
/// applied between attempts, never after the last one.
pub async fn bind_with_retry(addr: &str, policy: &BindSection) -> Result<TcpListener, BindError> {
  let attempts = policy.max_attempts.max(1);
  let delay = Duration::from_millis(policy.delay_ms);

  for attempt in 1..=attempts {
    match TcpListener::bind(addr).await {
      Ok(listener) => {
        if attempt > 1 {
          tracing::info!("Bound {} on attempt {}", addr, attempt);
        }
        return Ok(listener);
      }
      Err(e) if e.kind() == ErrorKind::AddrInUse => {
        tracing::warn!(
          "Address {} in use (attempt {}/{}): {}",
          addr,
          attempt,
          attempts,
          e
        );
        if attempt < attempts {
          tokio::time::sleep(delay).await;
        }
      }
      Err(e) => {
        return Err(BindError::Io {
          addr: addr.to_string(),
          source: e,
        });
      }
    }
  }

  Err(BindError::Exhausted {
    addr: addr.to_string(),
    attempts,
  })
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c()
      .await
      .expect("Failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("Failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Received SIGINT"),
    _ = terminate => tracing::info!("Received SIGTERM"),
  }
}
