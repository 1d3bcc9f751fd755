//! Configuration Module
//!
//! Server settings from environment variables and caching settings from a
//! string-keyed attribute map.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::error::{RepositoryError, Result};

/// Environment variable -> caching attribute name.
const ENV_ATTRIBUTES: [(&str, &str); 12] = [
    ("CACHING_STRATEGY", "cachingStrategy"),
    ("CACHING_PROVIDER", "cachingProvider"),
    ("CACHE_TIMEOUT", "timeout"),
    ("CACHE_MAX_RESULTS", "maxResults"),
    ("CACHE_PREFIX", "cachePrefix"),
    ("MAX_ENTRIES", "maxEntries"),
    ("REDIS_HOST", "host"),
    ("REDIS_PORT", "port"),
    ("REDIS_PASSWORD", "password"),
    ("REDIS_SSL", "ssl"),
    ("REDIS_CONNECTION_STRING", "connectionString"),
    ("REDIS_OPERATION_TIMEOUT_MS", "operationTimeout"),
];

// == Strategy / Provider Kinds ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Generational keys plus TTL
    Standard,
    /// TTL only
    Timeout,
    None,
}

impl FromStr for StrategyKind {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "standardcachingstrategy" => Ok(StrategyKind::Standard),
            "timeout" | "timeoutcachingstrategy" => Ok(StrategyKind::Timeout),
            "none" | "nocaching" | "nocachingstrategy" => Ok(StrategyKind::None),
            other => Err(RepositoryError::Configuration(format!(
                "unknown caching strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Memory,
    Redis,
}

impl FromStr for ProviderKind {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "inmemorycacheprovider" => Ok(ProviderKind::Memory),
            "redis" | "rediscacheprovider" => Ok(ProviderKind::Redis),
            other => Err(RepositoryError::Configuration(format!(
                "unknown caching provider '{}'",
                other
            ))),
        }
    }
}

// == Caching Settings ==
/// Caching configuration consumed once when a `RepositoryContext` is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CachingSettings {
    pub strategy: StrategyKind,
    pub provider: ProviderKind,
    /// TTL in seconds for cached results; `None` never expires them
    pub timeout: Option<u64>,
    /// Result lists longer than this are not cached
    pub max_results: Option<usize>,
    pub prefix: String,
    /// In-memory provider capacity
    pub max_entries: usize,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub ssl: bool,
    pub connection_string: Option<String>,
    /// Read/write deadline for each remote provider call, in milliseconds
    pub operation_timeout_ms: u64,
}

impl Default for CachingSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Standard,
            provider: ProviderKind::Memory,
            timeout: Some(300),
            max_results: None,
            prefix: "cache".to_string(),
            max_entries: 10_000,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            ssl: false,
            connection_string: None,
            operation_timeout_ms: 2_000,
        }
    }
}

impl CachingSettings {
    /// Builds settings from named attributes; missing attributes keep their defaults.
    ///
    /// # Attributes
    /// `cachingStrategy`, `cachingProvider`, `timeout` (seconds, 0 = no expiry),
    /// `maxResults`, `cachePrefix`, `maxEntries`, `host`, `port`, `password`,
    /// `ssl`, `connectionString`, `operationTimeout` (milliseconds, positive)
    ///
    /// # Errors
    /// `Configuration` for unknown attribute names or unparsable values.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Result<Self> {
        let mut settings = Self::default();
        for (name, value) in attributes {
            let value = value.trim();
            match name.as_str() {
                "cachingStrategy" => settings.strategy = value.parse()?,
                "cachingProvider" => settings.provider = value.parse()?,
                "timeout" => {
                    let seconds: u64 = parse_number(name, value)?;
                    settings.timeout = (seconds > 0).then_some(seconds);
                }
                "maxResults" => settings.max_results = Some(parse_number(name, value)?),
                "cachePrefix" => {
                    if value.is_empty() || value.contains('/') {
                        return Err(RepositoryError::Configuration(format!(
                            "cachePrefix '{}' must be non-empty and contain no '/'",
                            value
                        )));
                    }
                    settings.prefix = value.to_string();
                }
                "maxEntries" => {
                    settings.max_entries = parse_number(name, value)?;
                    if settings.max_entries == 0 {
                        return Err(RepositoryError::Configuration(
                            "maxEntries must be positive".to_string(),
                        ));
                    }
                }
                "host" => settings.host = value.to_string(),
                "port" => settings.port = parse_number(name, value)?,
                "password" => settings.password = non_empty(value),
                "ssl" => settings.ssl = parse_bool(name, value)?,
                "connectionString" => settings.connection_string = non_empty(value),
                "operationTimeout" => {
                    settings.operation_timeout_ms = parse_number(name, value)?;
                    if settings.operation_timeout_ms == 0 {
                        return Err(RepositoryError::Configuration(
                            "operationTimeout must be positive".to_string(),
                        ));
                    }
                }
                other => {
                    return Err(RepositoryError::Configuration(format!(
                        "unknown caching attribute '{}'",
                        other
                    )))
                }
            }
        }
        Ok(settings)
    }
}

fn parse_number<N: FromStr>(name: &str, value: &str) -> Result<N> {
    value.parse().map_err(|_| {
        RepositoryError::Configuration(format!("{} must be a number, got '{}'", name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(RepositoryError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// == Server Config ==
/// Demo server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background purge interval in seconds
    pub cleanup_interval: u64,
    pub caching: CachingSettings,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Purge frequency in seconds (default: 1)
    /// - `CACHING_STRATEGY`, `CACHING_PROVIDER`, `CACHE_TIMEOUT`,
    ///   `CACHE_MAX_RESULTS`, `CACHE_PREFIX`, `MAX_ENTRIES`, `REDIS_HOST`,
    ///   `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_SSL`, `REDIS_CONNECTION_STRING`,
    ///   `REDIS_OPERATION_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        let attributes: HashMap<String, String> = ENV_ATTRIBUTES
            .iter()
            .filter_map(|(var, attribute)| env::var(var).ok().map(|v| (attribute.to_string(), v)))
            .collect();

        Ok(Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            caching: CachingSettings::from_attributes(&attributes)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            caching: CachingSettings::default(),
        }
    }
}
