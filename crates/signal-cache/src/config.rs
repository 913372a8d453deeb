//! Cache configuration — `spec.md` §6.
//!
//! Enumerated knobs only; eviction policy mechanics live in
//! [`crate::cache`]. Follows the env-loading convention used by
//! `toka_llm_gateway::config`: typed fields, a builder for programmatic
//! construction, and a fallible `from_env` for process wiring.

use std::num::NonZeroUsize;
use std::time::Duration;

use thiserror::Error;

const ENV_MAXIMUM_SIZE: &str = "SIGNAL_CACHE_MAXIMUM_SIZE";
const ENV_EXPIRE_AFTER_WRITE_SECS: &str = "SIGNAL_CACHE_EXPIRE_AFTER_WRITE_SECS";
const ENV_EXPIRE_AFTER_ACCESS_SECS: &str = "SIGNAL_CACHE_EXPIRE_AFTER_ACCESS_SECS";
const ENV_NAME_PREFIX: &str = "SIGNAL_CACHE_NAME_PREFIX";

const DEFAULT_MAXIMUM_SIZE: usize = 10_000;
const DEFAULT_EXPIRE_AFTER_WRITE: Duration = Duration::from_secs(300);
const DEFAULT_NAME_PREFIX: &str = "signal-cache";

/// Cache sizing and eviction knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    maximum_size: NonZeroUsize,
    expire_after_write: Duration,
    expire_after_access: Option<Duration>,
    cache_name_prefix: String,
}

impl CacheConfig {
    /// Start a builder seeded with the documented defaults.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Cap on the number of `READY` entries.
    pub fn maximum_size(&self) -> NonZeroUsize {
        self.maximum_size
    }

    /// Duration after which an entry becomes eligible for eviction,
    /// counted from the write that installed it.
    pub fn expire_after_write(&self) -> Duration {
        self.expire_after_write
    }

    /// Optional sliding-window eviction, counted from last access.
    pub fn expire_after_access(&self) -> Option<Duration> {
        self.expire_after_access
    }

    /// Prefix used only for metrics/diagnostics labels.
    pub fn cache_name_prefix(&self) -> &str {
        &self.cache_name_prefix
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = CacheConfigBuilder::default();

        if let Ok(raw) = std::env::var(ENV_MAXIMUM_SIZE) {
            let parsed: usize = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue(ENV_MAXIMUM_SIZE, raw.clone()))?;
            let nonzero = NonZeroUsize::new(parsed)
                .ok_or(ConfigError::InvalidValue(ENV_MAXIMUM_SIZE, raw))?;
            builder = builder.maximum_size(nonzero);
        }

        if let Ok(raw) = std::env::var(ENV_EXPIRE_AFTER_WRITE_SECS) {
            let secs: u64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue(ENV_EXPIRE_AFTER_WRITE_SECS, raw))?;
            builder = builder.expire_after_write(Duration::from_secs(secs));
        }

        if let Ok(raw) = std::env::var(ENV_EXPIRE_AFTER_ACCESS_SECS) {
            let secs: u64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue(ENV_EXPIRE_AFTER_ACCESS_SECS, raw))?;
            builder = builder.expire_after_access(Duration::from_secs(secs));
        }

        if let Ok(prefix) = std::env::var(ENV_NAME_PREFIX) {
            builder = builder.cache_name_prefix(prefix);
        }

        Ok(builder.build())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfigBuilder::default().build()
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    maximum_size: NonZeroUsize,
    expire_after_write: Duration,
    expire_after_access: Option<Duration>,
    cache_name_prefix: String,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self {
            maximum_size: NonZeroUsize::new(DEFAULT_MAXIMUM_SIZE)
                .expect("default maximum size is non-zero"),
            expire_after_write: DEFAULT_EXPIRE_AFTER_WRITE,
            expire_after_access: None,
            cache_name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

impl CacheConfigBuilder {
    /// Set the cap on the number of `READY` entries.
    pub fn maximum_size(mut self, maximum_size: NonZeroUsize) -> Self {
        self.maximum_size = maximum_size;
        self
    }

    /// Set the write-based expiry.
    pub fn expire_after_write(mut self, duration: Duration) -> Self {
        self.expire_after_write = duration;
        self
    }

    /// Set the access-based sliding expiry.
    pub fn expire_after_access(mut self, duration: Duration) -> Self {
        self.expire_after_access = Some(duration);
        self
    }

    /// Set the metrics/diagnostics name prefix.
    pub fn cache_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_name_prefix = prefix.into();
        self
    }

    /// Finish building.
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            maximum_size: self.maximum_size,
            expire_after_write: self.expire_after_write,
            expire_after_access: self.expire_after_access,
            cache_name_prefix: self.cache_name_prefix,
        }
    }
}

/// Errors loading [`CacheConfig`] from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable was set but couldn't be parsed.
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CacheConfig::default();
        assert_eq!(config.maximum_size().get(), DEFAULT_MAXIMUM_SIZE);
        assert_eq!(config.expire_after_write(), DEFAULT_EXPIRE_AFTER_WRITE);
        assert!(config.expire_after_access().is_none());
        assert_eq!(config.cache_name_prefix(), DEFAULT_NAME_PREFIX);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = CacheConfig::builder()
            .maximum_size(NonZeroUsize::new(5).unwrap())
            .expire_after_access(Duration::from_secs(30))
            .cache_name_prefix("custom")
            .build();
        assert_eq!(config.maximum_size().get(), 5);
        assert_eq!(config.expire_after_access(), Some(Duration::from_secs(30)));
        assert_eq!(config.cache_name_prefix(), "custom");
    }
}
