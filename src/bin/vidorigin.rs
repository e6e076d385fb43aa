use clap::Parser;
use tokio::sync::broadcast;
use vidcache::config::VidcacheConfig;
use vidcache::{logging, net, service};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "vidorigin", about = "Video catalog origin server", version)]
struct Args {
  #[arg(short, long, env = "VIDCACHE_ORIGIN_PORT")]
  port: Option<u16>,
  #[arg(long)]
  host: Option<String>,
  /// SQLite catalog file
  #[arg(long, env = "VIDCACHE_CATALOG_PATH")]
  catalog: Option<String>,
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  let mut config = VidcacheConfig::load(args.config.as_deref())?;
  if let Some(port) = args.port {
    config.origin.port = port;
  }
  if let Some(host) = args.host {
    config.origin.host = host;
  }
  if let Some(path) = args.catalog {
    config.catalog.path = path;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  logging::init(&config.logging.level);

  let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
  tokio::spawn(async move {
    net::shutdown_signal().await;
    let _ = shutdown_tx.send(());
  });

  if let Err(e) = service::run_origin(&config, shutdown_rx).await {
    tracing::error!("Origin failed: {:#}", e);
    return Err(e);
  }
  tracing::info!("Shutdown complete");
  Ok(())
}
