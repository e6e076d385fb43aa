use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for the proxy
#[derive(Debug, Default)]
pub struct ProxyStats {
  requests: AtomicU64,
  hits: AtomicU64,
  misses: AtomicU64,
  cache_unavailable: AtomicU64,
  origin_fetches: AtomicU64,
  origin_failures: AtomicU64,
}

/// Point-in-time copy of [`ProxyStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub requests: u64,
  pub hits: u64,
  pub misses: u64,
  /// Lookups where the backend could not answer (also counted as misses)
  pub cache_unavailable: u64,
  pub origin_fetches: u64,
  pub origin_failures: u64,
}

impl StatsSnapshot {
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}

impl ProxyStats {
  pub(crate) fn record_request(&self) {
    self.requests.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_miss(&self, backend_available: bool) {
    self.misses.fetch_add(1, Ordering::Relaxed);
    if !backend_available {
      self.cache_unavailable.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub(crate) fn record_origin(&self, ok: bool) {
    if ok {
      self.origin_fetches.fetch_add(1, Ordering::Relaxed);
    } else {
      self.origin_failures.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      requests: self.requests.load(Ordering::Relaxed),
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      cache_unavailable: self.cache_unavailable.load(Ordering::Relaxed),
      origin_fetches: self.origin_fetches.load(Ordering::Relaxed),
      origin_failures: self.origin_failures.load(Ordering::Relaxed),
    }
  }
}
