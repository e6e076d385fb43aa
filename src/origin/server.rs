use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use super::{DATABASE_ERROR, NOT_FOUND};
use crate::catalog::CatalogStore;
use crate::error::WireError;
use crate::wire;

/// Origin listener.
///
/// Each connection goes AwaitRequest -> LookupCatalog -> RespondAndClose and is
/// handled to completion before the next one is accepted. A catalog failure
/// is answered with [`DATABASE_ERROR`] and never stops the listener.
pub struct OriginServer {
  catalog: Arc<dyn CatalogStore>,
  read_timeout: Duration,
}

impl OriginServer {
  pub fn new(catalog: Arc<dyn CatalogStore>, read_timeout: Duration) -> Self {
    Self {
      catalog,
      read_timeout,
    }
  }

  /// Payload for `key`: the catalog value, [`NOT_FOUND`] or [`DATABASE_ERROR`]
  pub async fn respond(&self, key: &str) -> String {
    match self.catalog.lookup(key).await {
      Ok(Some(payload)) => {
        tracing::info!("Sending '{}' for '{}'", payload, key);
        payload
      }
      Ok(None) => {
        tracing::info!("No catalog entry for '{}'", key);
        NOT_FOUND.to_string()
      }
      Err(e) => {
        tracing::error!("Catalog lookup for '{}' failed: {}", key, e);
        DATABASE_ERROR.to_string()
      }
    }
  }

  pub async fn run(
    self,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> Result<(), anyhow::Error> {
    tracing::info!("Origin listening on {}", listener.local_addr()?);

    loop {
      tokio::select! {
        result = listener.accept() => {
          match result {
            Ok((stream, peer)) => {
              if let Err(e) = self.handle_connection(stream, peer).await {
                tracing::debug!("Origin client {} error: {}", peer, e);
              }
            }
            Err(e) => tracing::error!("Accept error: {}", e),
          }
        }
        _ = shutdown_rx.recv() => {
          tracing::info!("Origin shutting down");
          break;
        }
      }
    }
    Ok(())
  }

  async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<(), WireError> {
    tracing::debug!("Origin connection from {}", peer);

    let key = wire::with_timeout(self.read_timeout, wire::read_message(&mut stream)).await?;
    tracing::info!("Received request for '{}'", key);

    let payload = self.respond(&key).await;
    wire::write_message(&mut stream, &payload).await?;
    let _ = stream.shutdown().await;
    Ok(())
  }
}
