use clap::Parser;
use tokio::sync::broadcast;
use vidcache::config::{CacheMode, VidcacheConfig};
use vidcache::{logging, net, service};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "vidproxy", about = "Caching proxy in front of the video origin", version)]
struct Args {
  #[arg(short, long, env = "VIDCACHE_PROXY_PORT")]
  port: Option<u16>,
  #[arg(long)]
  host: Option<String>,
  /// Origin address as host:port
  #[arg(short, long, env = "VIDCACHE_ORIGIN")]
  origin: Option<String>,
  /// Flush the cache before accepting connections
  #[arg(long)]
  clear_cache: bool,
  /// redis or memory
  #[arg(long)]
  cache_mode: Option<CacheMode>,
  #[arg(long, env = "VIDCACHE_REDIS_HOST")]
  redis_host: Option<String>,
  #[arg(long, env = "VIDCACHE_REDIS_PORT")]
  redis_port: Option<u16>,
  #[arg(long)]
  concurrency: Option<usize>,
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
}

fn apply_args(config: &mut VidcacheConfig, args: Args) -> Result<(), anyhow::Error> {
  if let Some(port) = args.port {
    config.proxy.port = port;
  }
  if let Some(host) = args.host {
    config.proxy.host = host;
  }
  if let Some(origin) = args.origin {
    let (host, port) = origin
      .rsplit_once(':')
      .ok_or_else(|| anyhow::anyhow!("Origin must be host:port, got '{}'", origin))?;
    config.origin.host = host.to_string();
    config.origin.port = port.parse()?;
  }
  if args.clear_cache {
    config.proxy.clear_cache = true;
  }
  if let Some(mode) = args.cache_mode {
    config.cache.mode = mode;
  }
  if let Some(host) = args.redis_host {
    config.cache.host = host;
  }
  if let Some(port) = args.redis_port {
    config.cache.port = port;
  }
  if let Some(n) = args.concurrency {
    config.proxy.concurrency = n;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  let mut config = VidcacheConfig::load(args.config.as_deref())?;
  apply_args(&mut config, args)?;

  logging::init(&config.logging.level);

  let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
  tokio::spawn(async move {
    net::shutdown_signal().await;
    let _ = shutdown_tx.send(());
  });

  if let Err(e) = service::run_proxy(&config, shutdown_rx).await {
    tracing::error!("Proxy failed: {:#}", e);
    return Err(e);
  }
  tracing::info!("Shutdown complete");
  Ok(())
}
