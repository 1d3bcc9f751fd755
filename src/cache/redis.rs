//! Redis Cache Provider
//!
//! Available with the `redis` cargo feature.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use redis::{Commands, Connection};
use tracing::info;

use crate::cache::{CachePriority, CacheProvider};
use crate::error::{RepositoryError, Result};

/// Increment-with-default in one round trip.
const INCREMENT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    redis.call('SET', KEYS[1], ARGV[1])
end
return redis.call('INCRBY', KEYS[1], ARGV[2])
"#;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Socket read/write deadline when the settings name none.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection settings for [`RedisCacheProvider`].
#[derive(Debug, Clone, Default)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub ssl: bool,
    /// Full `redis://` URL; takes precedence over the individual fields.
    pub connection_string: Option<String>,
    /// Deadline for every command's socket read and write
    pub operation_timeout: Option<Duration>,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        if let Some(url) = &self.connection_string {
            return url.clone();
        }
        let scheme = if self.ssl { "rediss" } else { "redis" };
        match &self.password {
            Some(password) => format!("{}://:{}@{}:{}", scheme, password, self.host, self.port),
            None => format!("{}://{}:{}", scheme, self.host, self.port),
        }
    }

    /// Configured operation deadline; zero or unset falls back to the default.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT)
    }
}

/// Provider backed by one Redis connection.
pub struct RedisCacheProvider {
    connection: Mutex<Connection>,
    script: redis::Script,
    default_ttl: Option<u64>,
}

impl RedisCacheProvider {
    pub fn connect(settings: &RedisSettings, default_ttl: Option<u64>) -> Result<Self> {
        let client = redis::Client::open(settings.url()).map_err(provider_error)?;
        let connection = client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(provider_error)?;

        // A hung server must fail the call, not hold the connection lock forever.
        let timeout = settings.operation_timeout();
        connection
            .set_read_timeout(Some(timeout))
            .map_err(provider_error)?;
        connection
            .set_write_timeout(Some(timeout))
            .map_err(provider_error)?;
        info!(
            host = %settings.host,
            port = settings.port,
            timeout_ms = timeout.as_millis() as u64,
            "Connected to Redis cache"
        );

        Ok(Self {
            connection: Mutex::new(connection),
            script: redis::Script::new(INCREMENT_SCRIPT),
            default_ttl,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| RepositoryError::Provider("Redis connection lock poisoned".to_string()))
    }
}

impl CacheProvider for RedisCacheProvider {
    fn name(&self) -> &str {
        "redis"
    }

    fn set(&self, key: &str, value: String, priority: CachePriority, ttl_seconds: Option<u64>) -> Result<()> {
        let ttl = match priority {
            CachePriority::NotRemovable => ttl_seconds,
            _ => ttl_seconds.or(self.default_ttl),
        };
        let mut connection = self.lock()?;
        match ttl {
            Some(seconds) => connection.set_ex::<_, _, ()>(key, value, seconds),
            None => connection.set::<_, _, ()>(key, value),
        }
        .map_err(provider_error)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.lock()?.get(key).map_err(provider_error)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.lock()?.exists(key).map_err(provider_error)
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.lock()?.del::<_, ()>(key).map_err(provider_error)
    }

    fn increment(&self, key: &str, default_value: i64, increment_by: i64) -> Result<i64> {
        let mut connection = self.lock()?;
        self.script
            .key(key)
            .arg(default_value)
            .arg(increment_by)
            .invoke::<i64>(&mut *connection)
            .map_err(provider_error)
    }
}

fn provider_error(error: redis::RedisError) -> RepositoryError {
    RepositoryError::Provider(error.to_string())
}
