//! Send one key to the proxy and print the reply

use clap::Parser;
use std::time::Duration;
use tokio::net::TcpStream;
use vidcache::wire;

#[derive(Parser)]
#[command(name = "vidreq", about = "Request a video from the proxy", version)]
struct Args {
  /// Key to look up, e.g. video3
  #[arg(short, long)]
  data: String,
  #[arg(long, default_value = "127.0.0.1:3000", env = "VIDCACHE_PROXY")]
  proxy: String,
  #[arg(long, default_value_t = 10_000)]
  timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  let mut stream = TcpStream::connect(&args.proxy)
    .await
    .map_err(|e| anyhow::anyhow!("Error connecting to proxy server {}: {}", args.proxy, e))?;
  let reply = wire::with_timeout(
    Duration::from_millis(args.timeout_ms),
    wire::exchange(&mut stream, &args.data),
  )
  .await?;

  println!("{}", reply);
  Ok(())
}
