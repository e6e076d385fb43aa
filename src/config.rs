//! YAML configuration for the proxy, the origin and the tools

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILES: [&str; 2] = ["vidcache.yaml", "vidcache.yml"];

/// Substitute `${NAME}` and `$NAME` with environment values (empty when unset)
fn expand_env_vars(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    out.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if let Some(braced) = after.strip_prefix('{') {
      if let Some(end) = braced.find('}') {
        out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
        rest = &braced[end + 1..];
        continue;
      }
      // Unterminated: keep the remainder verbatim
      out.push_str(&rest[pos..]);
      return out;
    }

    let name_len = after
      .chars()
      .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
      .count();
    if name_len == 0 {
      out.push('$');
    } else {
      out.push_str(&std::env::var(&after[..name_len]).unwrap_or_default());
    }
    rest = &after[name_len..];
  }

  out.push_str(rest);
  out
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VidcacheConfig {
  #[serde(default)]
  pub proxy: ProxySection,
  #[serde(default)]
  pub origin: OriginSection,
  #[serde(default)]
  pub cache: CacheSection,
  #[serde(default)]
  pub catalog: CatalogSection,
  #[serde(default)]
  pub bind: BindSection,
  #[serde(default)]
  pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_proxy_port")]
  pub port: u16,
  /// Flush the cache backend before accepting connections
  #[serde(default)]
  pub clear_cache: bool,
  /// Connections handled at once. 1 keeps the strictly sequential accept loop.
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,
  /// How long to wait for a client's request before dropping the connection
  #[serde(default = "default_read_timeout_ms")]
  pub read_timeout_ms: u64,
}

fn default_host() -> String {
  "127.0.0.1".into()
}
fn default_proxy_port() -> u16 {
  3000
}
fn default_concurrency() -> usize {
  1
}
fn default_read_timeout_ms() -> u64 {
  5000
}

impl Default for ProxySection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_proxy_port(),
      clear_cache: false,
      concurrency: default_concurrency(),
      read_timeout_ms: default_read_timeout_ms(),
    }
  }
}

impl ProxySection {
  pub fn read_timeout(&self) -> Duration {
    Duration::from_millis(self.read_timeout_ms)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_origin_port")]
  pub port: u16,
  #[serde(default = "default_origin_timeout_ms")]
  pub connect_timeout_ms: u64,
  #[serde(default = "default_origin_timeout_ms")]
  pub io_timeout_ms: u64,
}

fn default_origin_port() -> u16 {
  9999
}
fn default_origin_timeout_ms() -> u64 {
  5000
}

impl Default for OriginSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_origin_port(),
      connect_timeout_ms: default_origin_timeout_ms(),
      io_timeout_ms: default_origin_timeout_ms(),
    }
  }
}

impl OriginSection {
  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  pub fn io_timeout(&self) -> Duration {
    Duration::from_millis(self.io_timeout_ms)
  }
}

/// Where cached payloads live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
  /// External Redis server (default)
  #[default]
  Redis,
  /// Process-local map, lost on restart
  Memory,
}

impl std::fmt::Display for CacheMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CacheMode::Redis => write!(f, "redis"),
      CacheMode::Memory => write!(f, "memory"),
    }
  }
}

impl std::str::FromStr for CacheMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "redis" | "external" => Ok(CacheMode::Redis),
      "memory" | "inmemory" | "builtin" => Ok(CacheMode::Memory),
      _ => Err(format!("Unknown cache mode: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
  #[serde(default)]
  pub mode: CacheMode,
  #[serde(default = "default_redis_host")]
  pub host: String,
  #[serde(default = "default_redis_port")]
  pub port: u16,
  #[serde(default)]
  pub password: Option<String>,
  #[serde(default)]
  pub database: u8,
  #[serde(default)]
  pub tls_enabled: bool,
  /// Upper bound for a single backend operation, connection included
  #[serde(default = "default_cache_timeout_ms")]
  pub timeout_ms: u64,
}

fn default_redis_host() -> String {
  "localhost".into()
}
fn default_redis_port() -> u16 {
  6379
}
fn default_cache_timeout_ms() -> u64 {
  1000
}

impl Default for CacheSection {
  fn default() -> Self {
    Self {
      mode: CacheMode::default(),
      host: default_redis_host(),
      port: default_redis_port(),
      password: None,
      database: 0,
      tls_enabled: false,
      timeout_ms: default_cache_timeout_ms(),
    }
  }
}

impl CacheSection {
  /// Redis connection URL, e.g. `redis://:secret@localhost:6379/0`
  pub fn connection_url(&self) -> String {
    let scheme = if self.tls_enabled { "rediss" } else { "redis" };
    let auth = match &self.password {
      Some(pwd) if !pwd.is_empty() => format!(":{}@", pwd),
      _ => String::new(),
    };
    format!(
      "{}://{}{}:{}/{}",
      scheme, auth, self.host, self.port, self.database
    )
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSection {
  #[serde(default = "default_catalog_path")]
  pub path: String,
  #[serde(default = "default_catalog_table")]
  pub table: String,
  #[serde(default = "default_key_column")]
  pub key_column: String,
  #[serde(default = "default_value_column")]
  pub value_column: String,
}

fn default_catalog_path() -> String {
  "videos.db".into()
}
fn default_catalog_table() -> String {
  "videos".into()
}
fn default_key_column() -> String {
  "Video Title".into()
}
fn default_value_column() -> String {
  "Video Data".into()
}

impl Default for CatalogSection {
  fn default() -> Self {
    Self {
      path: default_catalog_path(),
      table: default_catalog_table(),
      key_column: default_key_column(),
      value_column: default_value_column(),
    }
  }
}

/// Retry policy for a listener whose address is still in use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindSection {
  #[serde(default = "default_bind_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_bind_delay_ms")]
  pub delay_ms: u64,
}

fn default_bind_attempts() -> u32 {
  3
}
fn default_bind_delay_ms() -> u64 {
  5000
}

impl Default for BindSection {
  fn default() -> Self {
    Self {
      max_attempts: default_bind_attempts(),
      delay_ms: default_bind_delay_ms(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}
fn default_level() -> String {
  "info".into()
}
impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

impl VidcacheConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
    Ok(serde_yaml::from_str(&expand_env_vars(content))?)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in CONFIG_FILES {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  /// Explicit path if given, else auto-detected file, else defaults
  pub fn load(path: Option<&str>) -> Result<Self, anyhow::Error> {
    match path {
      Some(p) => Self::from_file(p),
      None => Ok(Self::find_and_load()?.unwrap_or_default()),
    }
  }

  pub fn proxy_address(&self) -> String {
    format!("{}:{}", self.proxy.host, self.proxy.port)
  }

  pub fn origin_address(&self) -> String {
    format!("{}:{}", self.origin.host, self.origin.port)
  }
}
