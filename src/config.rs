//! Configuration Module
//!
//! Loads service configuration from environment variables (optionally seeded
//! from a `.env` file by the binary). Every value has a default; values that
//! are present but malformed are rejected so the process fails at startup
//! rather than at steady state.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// TTL applied by the in-process cache when `CACHE_TTL` is unset.
pub const DEFAULT_IN_MEMORY_TTL: Duration = Duration::from_secs(60 * 60);

/// TTL applied by the remote cache when `CACHE_TTL` is unset.
pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("unknown cache type: {0:?}")]
    UnknownCacheType(String),

    #[error("validation error: {0}")]
    Validation(String),
}

// == Cache Kind ==
/// Selects the cache implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// In-process LRU/TTL cache
    InMemory,
    /// Remote Redis-backed cache
    Redis,
}

impl FromStr for CacheKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inmemory" | "in-memory" | "memory" => Ok(CacheKind::InMemory),
            "redis" => Ok(CacheKind::Redis),
            other => Err(ConfigError::UnknownCacheType(other.to_string())),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub kind: CacheKind,
    /// Maximum number of orders held by the in-process cache
    pub capacity: usize,
    /// Entry TTL; `None` means "use the backend default", zero disables expiry
    /// for the in-process cache
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// TTL used by the in-process cache.
    pub fn in_memory_ttl(&self) -> Duration {
        self.ttl.unwrap_or(DEFAULT_IN_MEMORY_TTL)
    }

    /// TTL used by the remote cache. Redis rejects `EX 0`, so zero also falls
    /// back to the default.
    pub fn remote_ttl(&self) -> Duration {
        match self.ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => DEFAULT_REMOTE_TTL,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == CacheKind::InMemory && self.capacity == 0 {
            return Err(ConfigError::Validation(
                "cache capacity must be positive for in-memory cache".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: CacheKind::InMemory,
            capacity: 1000,
            ttl: None,
        }
    }
}

/// Redis connection settings, shared by the remote cache and the streams.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Postgres connection settings for the durable store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "orders_db".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
        }
    }
}

/// Order stream consumption settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream the orders arrive on
    pub stream_name: String,
    /// Stream receiving rejected payloads
    pub dead_letter_stream: String,
    pub consumer_group: String,
    /// Stable per host so a restarted process finds its own pending entries
    pub consumer_name: String,
    /// Pending entries idle this long are claimed from other consumers on connect
    pub claim_min_idle: Duration,
    /// Pause before re-establishing a failed session
    pub reconnect_delay: Duration,
    /// Upper bound on waiting for a dead-letter delivery confirmation
    pub dead_letter_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "orders".to_string(),
            dead_letter_stream: "orders.dlq".to_string(),
            consumer_group: "order_cache".to_string(),
            consumer_name: default_consumer_name(),
            claim_min_idle: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            dead_letter_timeout: Duration::from_secs(5),
        }
    }
}

/// Service configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    pub cache: CacheConfig,
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub stream: StreamConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `CACHE_TYPE` - `inmemory` or `redis` (default: inmemory)
    /// - `CACHE_CAPACITY` - Maximum in-process cache entries (default: 1000)
    /// - `CACHE_TTL` - Entry TTL such as `30m` or `1h30m` (default: backend specific)
    /// - `REDIS_URL` - Redis connection string (default: redis://127.0.0.1:6379)
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DB_POOL_SIZE`
    /// - `STREAM_NAME`, `DLQ_STREAM_NAME`, `CONSUMER_GROUP`, `CONSUMER_NAME`
    /// - `RECONNECT_DELAY`, `DLQ_TIMEOUT` - durations (default: 5s each)
    /// - `CLAIM_MIN_IDLE` - idle time before another consumer's entry is claimed (default: 60s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);
        let db_defaults = DatabaseConfig::default();
        let stream_defaults = StreamConfig::default();

        let config = Self {
            server_port: vars.parse("SERVER_PORT", 8080)?,
            cache: CacheConfig {
                kind: match vars.raw("CACHE_TYPE") {
                    Some(value) => value.parse()?,
                    None => CacheKind::InMemory,
                },
                capacity: vars.parse("CACHE_CAPACITY", 1000)?,
                ttl: vars.duration("CACHE_TTL")?,
            },
            redis: RedisConfig {
                url: vars.string("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            database: DatabaseConfig {
                host: vars.string("DB_HOST", &db_defaults.host),
                port: vars.parse("DB_PORT", db_defaults.port)?,
                dbname: vars.string("DB_NAME", &db_defaults.dbname),
                user: vars.string("DB_USER", &db_defaults.user),
                password: vars.string("DB_PASSWORD", &db_defaults.password),
                max_size: vars.parse("DB_POOL_SIZE", db_defaults.max_size)?,
            },
            stream: StreamConfig {
                stream_name: vars.string("STREAM_NAME", &stream_defaults.stream_name),
                dead_letter_stream: vars
                    .string("DLQ_STREAM_NAME", &stream_defaults.dead_letter_stream),
                consumer_group: vars.string("CONSUMER_GROUP", &stream_defaults.consumer_group),
                consumer_name: vars.string("CONSUMER_NAME", &stream_defaults.consumer_name),
                claim_min_idle: vars
                    .duration("CLAIM_MIN_IDLE")?
                    .unwrap_or(stream_defaults.claim_min_idle),
                reconnect_delay: vars
                    .duration("RECONNECT_DELAY")?
                    .unwrap_or(stream_defaults.reconnect_delay),
                dead_letter_timeout: vars
                    .duration("DLQ_TIMEOUT")?
                    .unwrap_or(stream_defaults.dead_letter_timeout),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;

        if self.stream.stream_name.is_empty() {
            return Err(ConfigError::Validation("stream name is required".to_string()));
        }
        if self.stream.dead_letter_stream.is_empty() {
            return Err(ConfigError::Validation(
                "dead-letter stream name is required".to_string(),
            ));
        }
        if self.stream.stream_name == self.stream.dead_letter_stream {
            return Err(ConfigError::Validation(
                "dead-letter stream must differ from the order stream".to_string(),
            ));
        }
        if self.database.max_size == 0 {
            return Err(ConfigError::Validation(
                "database pool size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            cache: CacheConfig::default(),
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
            },
            database: DatabaseConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.raw(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.raw(name) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }

    fn duration(&self, name: &str) -> Result<Option<Duration>, ConfigError> {
        self.raw(name).map(|v| parse_duration(&v)).transpose()
    }
}

/// `consumer-{hostname}`, or a random name when the hostname is unreadable.
fn default_consumer_name() -> String {
    match hostname::get().ok().and_then(|name| name.into_string().ok()) {
        Some(name) if !name.is_empty() => format!("consumer-{}", name),
        _ => format!("consumer-{}", uuid::Uuid::new_v4()),
    }
}

// == Duration Parsing ==
/// Parses a duration string such as `"30s"`, `"5m"`, `"1h30m"` or `"1.5h"`.
///
/// Units: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. A bare `"0"` is accepted.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let input = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let mut rest = input;
    let mut total_nanos: f64 = 0.0;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(invalid());
        }
        let (num_str, tail) = rest.split_at(num_end);
        let value: f64 = num_str.parse().map_err(|_| invalid())?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };

        total_nanos += value * nanos_per_unit;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}
