//! Cache-aside hot path benchmarks.
//!
//! Run with: cargo bench --bench proxy

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;
use vidcache::{CacheBackend, MemoryCacheBackend, Origin, OriginError, ProxyServer};

struct EchoOrigin;

#[async_trait]
impl Origin for EchoOrigin {
  async fn fetch(&self, key: &str) -> Result<String, OriginError> {
    Ok(format!("{}.mp4", key))
  }
}

fn create_runtime() -> Runtime {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap()
}

fn bench_handle_request(c: &mut Criterion) {
  let rt = create_runtime();
  let mut group = c.benchmark_group("handle_request");

  let cache = Arc::new(MemoryCacheBackend::with_entries([("video1", "video1.mp4")]));
  let proxy = ProxyServer::new(cache.clone(), Arc::new(EchoOrigin));

  group.bench_function("hit", |b| {
    b.to_async(&rt)
      .iter(|| async { black_box(proxy.handle_request("video1").await) });
  });

  group.bench_function("miss_then_fill", |b| {
    b.to_async(&rt).iter(|| async {
      cache.clear_all().await.unwrap();
      black_box(proxy.handle_request("video2").await)
    });
  });

  group.finish();
}

criterion_group!(benches, bench_handle_request);
criterion_main!(benches);
