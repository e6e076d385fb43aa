//! Startup sequences for the two listeners

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cache;
use crate::catalog::SqliteCatalog;
use crate::config::VidcacheConfig;
use crate::net::bind_with_retry;
use crate::origin::{OriginClient, OriginServer};
use crate::proxy::ProxyServer;

/// Build the proxy, optionally flush the cache, bind and serve until shutdown.
///
/// A requested flush that fails aborts startup, as does bind exhaustion.
pub async fn run_proxy(
  config: &VidcacheConfig,
  shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), anyhow::Error> {
  let backend = cache::from_config(&config.cache)?;
  let origin = Arc::new(OriginClient::from_config(&config.origin));
  tracing::info!("Forwarding misses to origin {}", origin.addr());

  let proxy = Arc::new(ProxyServer::from_config(backend, origin, &config.proxy));

  if config.proxy.clear_cache {
    proxy
      .clear_cache()
      .await
      .map_err(|e| anyhow::anyhow!("Cache clear requested but failed: {}", e))?;
  }

  let listener = bind_with_retry(&config.proxy_address(), &config.bind).await?;
  proxy.run(listener, shutdown_rx).await
}

/// Bind the origin listener and serve catalog lookups until shutdown
pub async fn run_origin(
  config: &VidcacheConfig,
  shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), anyhow::Error> {
  let catalog = Arc::new(SqliteCatalog::new(&config.catalog));
  tracing::info!(
    "Serving catalog {} (table '{}')",
    config.catalog.path,
    config.catalog.table
  );

  let server = OriginServer::new(catalog, config.origin.io_timeout());
  let listener = bind_with_retry(&config.origin_address(), &config.bind).await?;
  server.run(listener, shutdown_rx).await
}
