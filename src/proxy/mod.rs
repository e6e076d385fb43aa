//! Cache-aside proxy in front of the origin

mod stats;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex, Semaphore};

pub use self::stats::{ProxyStats, StatsSnapshot};

use crate::cache::CacheBackend;
use crate::config::ProxySection;
use crate::error::{CacheError, WireError};
use crate::origin::Origin;
use crate::wire;

/// Reply sent to the client when the origin cannot be reached
pub const ORIGIN_UNREACHABLE: &str = "Error connecting to origin server";

/// Result of consulting the cache before going to the origin
#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheLookup {
  Hit(String),
  Miss,
  /// Backend could not answer; skip the write-back as well
  Unavailable,
}

pub struct ProxyServer {
  cache: Arc<dyn CacheBackend>,
  origin: Arc<dyn Origin>,
  stats: ProxyStats,
  /// Serializes cache writes when connections are handled concurrently
  write_lock: Mutex<()>,
  read_timeout: Duration,
  concurrency: usize,
}

impl ProxyServer {
  pub fn new(cache: Arc<dyn CacheBackend>, origin: Arc<dyn Origin>) -> Self {
    let defaults = ProxySection::default();
    Self {
      cache,
      origin,
      stats: ProxyStats::default(),
      write_lock: Mutex::new(()),
      read_timeout: defaults.read_timeout(),
      concurrency: defaults.concurrency,
    }
  }

  pub fn from_config(
    cache: Arc<dyn CacheBackend>,
    origin: Arc<dyn Origin>,
    config: &ProxySection,
  ) -> Self {
    Self::new(cache, origin)
      .with_read_timeout(config.read_timeout())
      .with_concurrency(config.concurrency)
  }

  pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
    self.read_timeout = read_timeout;
    self
  }

  /// 1 (the default) handles one connection at a time
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  /// Wipe every cache entry. Unlike request handling, a failure here is returned.
  pub async fn clear_cache(&self) -> Result<(), CacheError> {
    self.cache.clear_all().await?;
    tracing::info!("Cleared cache ({})", self.cache.describe());
    Ok(())
  }

  async fn lookup(&self, key: &str) -> CacheLookup {
    match self.cache.get(key).await {
      Ok(Some(payload)) => CacheLookup::Hit(payload),
      Ok(None) => CacheLookup::Miss,
      Err(e) => {
        tracing::warn!("Cache lookup for '{}' failed, going to origin: {}", key, e);
        CacheLookup::Unavailable
      }
    }
  }

  /// Answer one key: cache first, then origin, then best-effort write-back.
  ///
  /// Always produces a reply. Whatever the origin returns is cached, including
  /// its not-found reply.
  pub async fn handle_request(&self, key: &str) -> String {
    self.stats.record_request();

    let backend_available = match self.lookup(key).await {
      CacheLookup::Hit(payload) => {
        self.stats.record_hit();
        tracing::info!("X-Cache: HIT '{}' -> '{}'", key, payload);
        return payload;
      }
      CacheLookup::Miss => true,
      CacheLookup::Unavailable => false,
    };
    self.stats.record_miss(backend_available);
    tracing::info!("X-Cache: MISS '{}'", key);

    let payload = match self.origin.fetch(key).await {
      Ok(payload) => {
        self.stats.record_origin(true);
        tracing::info!("Received '{}' from origin", payload);
        payload
      }
      Err(e) => {
        self.stats.record_origin(false);
        tracing::error!("Origin fetch for '{}' failed: {}", key, e);
        return ORIGIN_UNREACHABLE.to_string();
      }
    };

    if backend_available {
      let _guard = self.write_lock.lock().await;
      if let Err(e) = self.cache.set(key, &payload).await {
        tracing::warn!("Skipping cache write for '{}': {}", key, e);
      }
    }

    payload
  }

  pub async fn run(
    self: Arc<Self>,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> Result<(), anyhow::Error> {
    tracing::info!(
      "Proxy listening on {} (cache: {}, concurrency: {})",
      listener.local_addr()?,
      self.cache.describe(),
      self.concurrency
    );
    let permits = Arc::new(Semaphore::new(self.concurrency));

    loop {
      // Concurrent mode reserves a worker slot before accepting; shutdown wins
      // even while every slot is busy.
      let permit = if self.concurrency > 1 {
        tokio::select! {
          permit = permits.clone().acquire_owned() => Some(permit?),
          _ = shutdown_rx.recv() => {
            tracing::info!("Proxy shutting down");
            break;
          }
        }
      } else {
        None
      };

      tokio::select! {
        result = listener.accept() => {
          match result {
            Ok((stream, peer)) => match permit {
              None => {
                if let Err(e) = self.handle_connection(stream, peer).await {
                  tracing::debug!("Proxy client {} error: {}", peer, e);
                }
              }
              Some(permit) => {
                let server = self.clone();
                tokio::spawn(async move {
                  if let Err(e) = server.handle_connection(stream, peer).await {
                    tracing::debug!("Proxy client {} error: {}", peer, e);
                  }
                  drop(permit);
                });
              }
            },
            Err(e) => tracing::error!("Accept error: {}", e),
          }
        }
        _ = shutdown_rx.recv() => {
          tracing::info!("Proxy shutting down");
          break;
        }
      }
    }

    let stats = self.stats();
    tracing::info!(
      "Proxy served {} requests ({} hits, {} misses, {} origin failures, hit rate {:.2})",
      stats.requests,
      stats.hits,
      stats.misses,
      stats.origin_failures,
      stats.hit_rate()
    );
    Ok(())
  }

  async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<(), WireError> {
    tracing::debug!("Proxy connection from {}", peer);

    let key = wire::with_timeout(self.read_timeout, wire::read_message(&mut stream)).await?;
    tracing::info!("Received request for '{}'", key);

    let payload = self.handle_request(&key).await;
    tracing::info!("Sending '{}' to client", payload);
    wire::write_message(&mut stream, &payload).await?;
    let _ = stream.shutdown().await;
    Ok(())
  }
}
