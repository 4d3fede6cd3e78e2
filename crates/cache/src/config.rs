//! Cache configuration management with precedence and validation
//!
//! Values come from three layers, later ones overriding earlier ones:
//! built-in defaults, an optional JSON file, then `URLCACHE_*` environment
//! variables.
use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the index file kept at the cache root
pub const INDEX_FILE_NAME: &str = "index.json";

/// Directory under the cache root that holds blobs
pub const BLOB_DIR_NAME: &str = "blobs";

pub const DEFAULT_MEMORY_CAPACITY: u64 = 4 * 1024 * 1024; // 4MiB
pub const DEFAULT_DISK_CAPACITY: u64 = 64 * 1024 * 1024; // 64MiB
pub const DEFAULT_MIN_DISK_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_MEMORY_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_MEMORY_ITEM_SIZE: u64 = 64 * 1024; // 64KiB
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TARGET_FILL_FACTOR: f64 = 0.8;

/// Configuration for a [`crate::UrlCache`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false the cache is bypassed: nothing is stored, every lookup misses
    pub enabled: bool,
    /// Directory holding the index file and blobs
    pub root: Option<PathBuf>,
    /// Upper bound on bytes held by the memory tier
    pub memory_capacity_bytes: u64,
    /// Disk usage that triggers eviction
    pub disk_capacity_bytes: u64,
    /// Responses living shorter than this never go to disk
    #[serde(with = "duration_secs")]
    pub min_disk_cache_item_interval: Duration,
    /// Small responses living at most this long stay in memory only
    #[serde(with = "duration_secs")]
    pub max_memory_cache_item_interval: Duration,
    /// Largest response the memory tier accepts
    pub max_memory_cache_item_size: u64,
    /// Treat a memory-only storage policy as disk-eligible
    pub allow_disk_override_for_memory_only_policy: bool,
    /// Period of the background maintenance timer
    #[serde(with = "duration_secs")]
    pub maintenance_interval: Duration,
    /// Eviction frees space down to `disk_capacity_bytes * target_fill_factor`
    pub target_fill_factor: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: None,
            memory_capacity_bytes: DEFAULT_MEMORY_CAPACITY,
            disk_capacity_bytes: DEFAULT_DISK_CAPACITY,
            min_disk_cache_item_interval: DEFAULT_MIN_DISK_INTERVAL,
            max_memory_cache_item_interval: DEFAULT_MAX_MEMORY_INTERVAL,
            max_memory_cache_item_size: DEFAULT_MAX_MEMORY_ITEM_SIZE,
            allow_disk_override_for_memory_only_policy: true,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            target_fill_factor: DEFAULT_TARGET_FILL_FACTOR,
        }
    }
}

impl CacheConfig {
    /// Check every invariant the cache relies on
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            let root = self.root_dir()?;
            if root.is_file() {
                return Err(CacheError::configuration(format!(
                    "cache root '{}' is a regular file",
                    root.display()
                )));
            }
        }

        if self.disk_capacity_bytes == 0 {
            return Err(CacheError::configuration(
                "disk capacity must be greater than zero",
            ));
        }

        if !(self.target_fill_factor > 0.0 && self.target_fill_factor <= 1.0) {
            return Err(CacheError::configuration(format!(
                "target fill factor must be in (0, 1], got {}",
                self.target_fill_factor
            )));
        }

        if self.max_memory_cache_item_size > self.memory_capacity_bytes {
            return Err(CacheError::configuration(format!(
                "max memory item size ({}) exceeds memory capacity ({})",
                self.max_memory_cache_item_size, self.memory_capacity_bytes
            )));
        }

        if self.maintenance_interval.is_zero() {
            return Err(CacheError::configuration(
                "maintenance interval must be greater than zero",
            ));
        }

        Ok(())
    }

    /// The configured root, or a configuration error if none was given
    pub fn root_dir(&self) -> Result<&Path> {
        self.root
            .as_deref()
            .filter(|root| !root.as_os_str().is_empty())
            .ok_or_else(|| CacheError::configuration("cache root directory is not set"))
    }

    /// Usage that eviction brings the disk tier down to
    pub fn eviction_target(&self) -> u64 {
        eviction_target(self.disk_capacity_bytes, self.target_fill_factor)
    }
}

pub(crate) fn eviction_target(capacity: u64, fill_factor: f64) -> u64 {
    (capacity as f64 * fill_factor).floor() as u64
}

/// Builder for creating cache configurations
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = Some(root.into());
        self
    }

    pub fn with_memory_capacity(mut self, bytes: u64) -> Self {
        self.config.memory_capacity_bytes = bytes;
        self
    }

    pub fn with_disk_capacity(mut self, bytes: u64) -> Self {
        self.config.disk_capacity_bytes = bytes;
        self
    }

    pub fn with_min_disk_cache_item_interval(mut self, interval: Duration) -> Self {
        self.config.min_disk_cache_item_interval = interval;
        self
    }

    pub fn with_max_memory_cache_item_interval(mut self, interval: Duration) -> Self {
        self.config.max_memory_cache_item_interval = interval;
        self
    }

    pub fn with_max_memory_cache_item_size(mut self, bytes: u64) -> Self {
        self.config.max_memory_cache_item_size = bytes;
        self
    }

    pub fn with_disk_override(mut self, allow: bool) -> Self {
        self.config.allow_disk_override_for_memory_only_policy = allow;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval = interval;
        self
    }

    pub fn with_target_fill_factor(mut self, factor: f64) -> Self {
        self.config.target_fill_factor = factor;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Environment variable naming an optional JSON config file
pub const CONFIG_FILE_ENV: &str = "URLCACHE_CONFIG";

/// Configuration loader that handles precedence
pub struct CacheConfigLoader;

impl CacheConfigLoader {
    /// Load configuration with full precedence handling, reading the file
    /// named by `URLCACHE_CONFIG` if set
    pub fn load() -> Result<CacheConfig> {
        let file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load defaults, then `file` if given and present, then the environment
    pub fn load_from(file: Option<&Path>) -> Result<CacheConfig> {
        let mut config = CacheConfig::default();

        if let Some(path) = file {
            if let Some(file_config) = Self::load_from_config_file(path)? {
                tracing::debug!(path = %path.display(), "loaded cache config file");
                config = file_config;
            }
        }

        Self::apply_env(&mut config)?;
        Ok(config)
    }

    fn load_from_config_file(path: &Path) -> Result<Option<CacheConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            operation: "read config file".to_string(),
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })?;

        let config = serde_json::from_str(&content).map_err(|e| CacheError::Serialization {
            key: path.display().to_string(),
            operation: SerializationOp::Decode,
            source: Box::new(e),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check config file syntax".to_string(),
            },
        })?;

        Ok(Some(config))
    }

    fn apply_env(config: &mut CacheConfig) -> Result<()> {
        if let Some(enabled) = env_var("URLCACHE_ENABLED") {
            config.enabled = parse_bool("URLCACHE_ENABLED", &enabled)?;
        }

        if let Some(root) = env_var("URLCACHE_ROOT") {
            config.root = Some(PathBuf::from(root));
        }

        if let Some(value) = env_var("URLCACHE_MEMORY_CAPACITY") {
            config.memory_capacity_bytes = parse_u64("URLCACHE_MEMORY_CAPACITY", &value)?;
        }

        if let Some(value) = env_var("URLCACHE_DISK_CAPACITY") {
            config.disk_capacity_bytes = parse_u64("URLCACHE_DISK_CAPACITY", &value)?;
        }

        if let Some(value) = env_var("URLCACHE_MIN_DISK_INTERVAL_SECS") {
            config.min_disk_cache_item_interval =
                Duration::from_secs(parse_u64("URLCACHE_MIN_DISK_INTERVAL_SECS", &value)?);
        }

        if let Some(value) = env_var("URLCACHE_MAX_MEMORY_INTERVAL_SECS") {
            config.max_memory_cache_item_interval =
                Duration::from_secs(parse_u64("URLCACHE_MAX_MEMORY_INTERVAL_SECS", &value)?);
        }

        if let Some(value) = env_var("URLCACHE_MAX_MEMORY_ITEM_SIZE") {
            config.max_memory_cache_item_size = parse_u64("URLCACHE_MAX_MEMORY_ITEM_SIZE", &value)?;
        }

        if let Some(value) = env_var("URLCACHE_ALLOW_DISK_OVERRIDE") {
            config.allow_disk_override_for_memory_only_policy =
                parse_bool("URLCACHE_ALLOW_DISK_OVERRIDE", &value)?;
        }

        if let Some(value) = env_var("URLCACHE_MAINTENANCE_INTERVAL_SECS") {
            config.maintenance_interval =
                Duration::from_secs(parse_u64("URLCACHE_MAINTENANCE_INTERVAL_SECS", &value)?);
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        CacheError::configuration(format!("{name} must be a non-negative integer, got '{value}'"))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CacheError::configuration(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
