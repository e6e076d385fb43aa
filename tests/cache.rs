//! Cache backends and degraded-mode behaviour

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use vidcache::cache;
use vidcache::config::{CacheMode, CacheSection};
use vidcache::{CacheBackend, CacheError, MemoryCacheBackend, Origin, OriginError, ProxyServer};

fn unreachable_redis() -> CacheSection {
  CacheSection {
    mode: CacheMode::Redis,
    host: "127.0.0.1".into(),
    port: 1,
    timeout_ms: 300,
    ..CacheSection::default()
  }
}

struct StaticOrigin;

#[async_trait]
impl Origin for StaticOrigin {
  async fn fetch(&self, key: &str) -> Result<String, OriginError> {
    Ok(format!("{}.mp4", key))
  }
}

#[tokio::test]
async fn test_memory_backend_through_trait_object() {
  let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCacheBackend::new());

  assert_eq!(backend.get("video1").await.unwrap(), None);
  backend.set("video1", "video1.mp4").await.unwrap();
  assert_eq!(
    backend.get("video1").await.unwrap().as_deref(),
    Some("video1.mp4")
  );
  backend.clear_all().await.unwrap();
  assert_eq!(backend.get("video1").await.unwrap(), None);
}

#[tokio::test]
async fn test_from_config_memory_mode() {
  let section = CacheSection {
    mode: CacheMode::Memory,
    ..CacheSection::default()
  };
  let backend = cache::from_config(&section).unwrap();
  assert_eq!(backend.describe(), "memory");
}

#[tokio::test]
async fn test_from_config_redis_mode_is_lazy() {
  // Building the backend must not require a reachable server
  let backend = cache::from_config(&unreachable_redis()).unwrap();
  assert_eq!(backend.describe(), "redis 127.0.0.1:1/0");
}

#[tokio::test]
async fn test_unreachable_redis_is_unavailable_not_absent() {
  let backend = cache::from_config(&unreachable_redis()).unwrap();
  assert!(matches!(
    backend.get("video1").await,
    Err(CacheError::Unavailable(_))
  ));
}

#[tokio::test]
async fn test_proxy_answers_with_unreachable_redis() {
  let backend = cache::from_config(&unreachable_redis()).unwrap();
  let proxy = ProxyServer::new(backend, Arc::new(StaticOrigin));

  assert_eq!(proxy.handle_request("video5").await, "video5.mp4");
  assert_eq!(proxy.stats().cache_unavailable, 1);
  assert!(proxy.clear_cache().await.is_err());
}

// =============================================================================
// Loopback Redis
// =============================================================================

/// Just enough of a RESP2 server for the connection handshake, GET, SET and FLUSHDB
struct FakeRedis {
  port: u16,
  store: Arc<Mutex<HashMap<String, String>>>,
  commands: Arc<Mutex<Vec<String>>>,
  accepts: Arc<AtomicUsize>,
}

impl FakeRedis {
  async fn start() -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let store = Arc::new(Mutex::new(HashMap::new()));
    let commands = Arc::new(Mutex::new(Vec::new()));
    let accepts = Arc::new(AtomicUsize::new(0));

    let (s, c, a) = (store.clone(), commands.clone(), accepts.clone());
    tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        a.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(serve_resp(stream, s.clone(), c.clone()));
      }
    });

    Self {
      port,
      store,
      commands,
      accepts,
    }
  }

  fn section(&self) -> CacheSection {
    CacheSection {
      mode: CacheMode::Redis,
      host: "127.0.0.1".into(),
      port: self.port,
      timeout_ms: 2000,
      ..CacheSection::default()
    }
  }

  fn saw(&self, name: &str) -> bool {
    self.commands.lock().iter().any(|c| c == name)
  }
}

async fn read_command<R>(reader: &mut R) -> io::Result<Option<Vec<String>>>
where
  R: AsyncBufRead + Unpin,
{
  fn header(line: &str, marker: char) -> io::Result<usize> {
    line
      .trim_end()
      .strip_prefix(marker)
      .and_then(|n| n.parse().ok())
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, line.to_string()))
  }

  let mut line = String::new();
  if reader.read_line(&mut line).await? == 0 {
    return Ok(None);
  }
  let count = header(&line, '*')?;

  let mut args = Vec::with_capacity(count);
  for _ in 0..count {
    line.clear();
    reader.read_line(&mut line).await?;
    let len = header(&line, '$')?;
    let mut buf = vec![0u8; len + 2];
    reader.read_exact(&mut buf).await?;
    buf.truncate(len);
    args.push(String::from_utf8_lossy(&buf).into_owned());
  }
  Ok(Some(args))
}

async fn serve_resp(
  stream: tokio::net::TcpStream,
  store: Arc<Mutex<HashMap<String, String>>>,
  commands: Arc<Mutex<Vec<String>>>,
) -> io::Result<()> {
  let (read, mut write) = stream.into_split();
  let mut reader = BufReader::new(read);

  while let Some(args) = read_command(&mut reader).await? {
    let name = args.first().map(|a| a.to_uppercase()).unwrap_or_default();
    commands.lock().push(name.clone());

    let reply = match (name.as_str(), args.get(1), args.get(2)) {
      ("GET", Some(key), _) => match store.lock().get(key) {
        Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
        None => "$-1\r\n".to_string(),
      },
      ("SET", Some(key), Some(value)) => {
        store.lock().insert(key.clone(), value.clone());
        "+OK\r\n".to_string()
      }
      ("FLUSHDB", _, _) => {
        store.lock().clear();
        "+OK\r\n".to_string()
      }
      // CLIENT SETINFO during the handshake
      _ => "+OK\r\n".to_string(),
    };
    write.write_all(reply.as_bytes()).await?;
  }
  Ok(())
}

#[tokio::test]
async fn test_redis_missing_key_is_absent_not_unavailable() {
  let redis = FakeRedis::start().await;
  let backend = cache::from_config(&redis.section()).unwrap();

  assert!(matches!(backend.get("video1").await, Ok(None)));
  assert!(redis.saw("GET"));
}

#[tokio::test]
async fn test_redis_set_is_last_write_wins() {
  let redis = FakeRedis::start().await;
  let backend = cache::from_config(&redis.section()).unwrap();

  backend.set("video1", "old.mp4").await.unwrap();
  backend.set("video1", "video1.mp4").await.unwrap();
  assert_eq!(
    backend.get("video1").await.unwrap().as_deref(),
    Some("video1.mp4")
  );
}

#[tokio::test]
async fn test_redis_clear_all_flushes_database() {
  let redis = FakeRedis::start().await;
  let backend = cache::from_config(&redis.section()).unwrap();

  backend.set("video1", "video1.mp4").await.unwrap();
  backend.clear_all().await.unwrap();
  assert!(redis.saw("FLUSHDB"));
  assert!(redis.store.lock().is_empty());
  assert_eq!(backend.get("video1").await.unwrap(), None);
}

#[tokio::test]
async fn test_redis_session_is_reused_across_calls() {
  let redis = FakeRedis::start().await;
  let backend = cache::from_config(&redis.section()).unwrap();

  for _ in 0..3 {
    backend.get("video1").await.unwrap();
  }
  backend.set("video1", "video1.mp4").await.unwrap();
  assert_eq!(redis.accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_proxy_miss_fills_redis() {
  let redis = FakeRedis::start().await;
  let backend = cache::from_config(&redis.section()).unwrap();
  let proxy = ProxyServer::new(backend, Arc::new(StaticOrigin));

  assert_eq!(proxy.handle_request("video2").await, "video2.mp4");
  assert_eq!(
    redis.store.lock().get("video2").map(String::as_str),
    Some("video2.mp4")
  );

  assert_eq!(proxy.handle_request("video2").await, "video2.mp4");
  let stats = proxy.stats();
  assert_eq!(stats.misses, 1);
  assert_eq!(stats.hits, 1);
  assert_eq!(stats.cache_unavailable, 0);
}

#[tokio::test]
async fn test_redis_connect_attempted_once_per_call() {
  // Accepts and hangs up immediately, so every handshake fails
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  let accepts = Arc::new(AtomicUsize::new(0));
  let counter = accepts.clone();
  tokio::spawn(async move {
    while let Ok((stream, _)) = listener.accept().await {
      counter.fetch_add(1, Ordering::SeqCst);
      drop(stream);
    }
  });

  let section = CacheSection {
    mode: CacheMode::Redis,
    host: "127.0.0.1".into(),
    port,
    timeout_ms: 3000,
    ..CacheSection::default()
  };
  let backend = cache::from_config(&section).unwrap();

  assert!(matches!(
    backend.get("video1").await,
    Err(CacheError::Unavailable(_))
  ));
  tokio::time::sleep(Duration::from_millis(300)).await;
  assert_eq!(accepts.load(Ordering::SeqCst), 1);

  // The next call tries again, once
  assert!(backend.set("video1", "video1.mp4").await.is_err());
  tokio::time::sleep(Duration::from_millis(300)).await;
  assert_eq!(accepts.load(Ordering::SeqCst), 2);
}
