use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::values::MetaMap;

/// Runtime tunables for batching, retries, caching, and re-authentication.
///
/// Values come from three layers: built-in defaults, an optional local TOML
/// file, and the server-pushed configuration fetched after authentication.
/// The auth-mechanism side channel is populated only by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Send attempts per request on retryable (network) errors.
    pub retry_count: u32,
    /// Pause between retry attempts.
    pub retry_interval_ms: u64,
    /// Pause between consecutive batch sends.
    pub batch_wait_ms: u64,
    /// How long a below-batch-size straggler is held before being sent.
    pub straggler_timeout_ms: u64,
    /// Default records per send request.
    pub batch_size: usize,
    /// Per-kind batch size overrides, keyed by endpoint kind name.
    pub batch_size_overrides: HashMap<String, usize>,
    /// Cached records older than this are pruned.
    pub prune_age_hours: u64,
    /// Hard cap on cached records per kind.
    pub max_cached: usize,
    /// Keep records in the cache after a confirmed send.
    pub retain_after_sent: bool,
    /// Proactively re-authenticate ahead of token expiry.
    pub reauth_before_expiry: bool,
    /// Period of the proactive re-authentication check.
    pub reauth_interval_ms: u64,
    /// Persist unsent records in the database-backed cache.
    pub durable_cache: bool,
    /// Server-populated auth-mechanism side channel; never read from disk.
    #[serde(skip)]
    pub auth_mechanisms: MetaMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_interval_ms: 2_000,
            batch_wait_ms: 500,
            straggler_timeout_ms: 30_000,
            batch_size: 25,
            batch_size_overrides: HashMap::new(),
            prune_age_hours: 72,
            max_cached: 10_000,
            retain_after_sent: false,
            reauth_before_expiry: false,
            reauth_interval_ms: 2_700_000,
            durable_cache: true,
            auth_mechanisms: MetaMap::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Value(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Value(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Value(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Value(format!("Failed to render config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Value(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Config file location: `BEACON_CONFIG` when set, XDG data dir
    /// otherwise, `~/.beacon` as the last resort.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("BEACON_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        if let Some(data_dir) = dirs::data_dir() {
            return Ok(data_dir.join("beacon").join("config.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Ok(PathBuf::from(home).join(".beacon").join("config.toml"));
        }

        Err(Error::Value(
            "Could not determine config path: no HOME directory or XDG data directory found"
                .to_string(),
        ))
    }

    /// Batch size for an endpoint kind, falling back to the default.
    pub fn batch_size_for(&self, kind: &str) -> usize {
        self.batch_size_overrides
            .get(kind)
            .copied()
            .unwrap_or(self.batch_size)
    }

    /// Apply the server-pushed configuration on top of the local values.
    pub fn merge_server(&mut self, server: &ServerConfig) {
        if let Some(v) = server.retry_count {
            self.retry_count = v;
        }
        if let Some(v) = server.retry_interval_ms {
            self.retry_interval_ms = v;
        }
        if let Some(v) = server.batch_wait_ms {
            self.batch_wait_ms = v;
        }
        if let Some(v) = server.straggler_timeout_ms {
            self.straggler_timeout_ms = v;
        }
        if let Some(v) = server.batch_size {
            self.batch_size = v;
        }
        if let Some(overrides) = &server.batch_size_overrides {
            self.batch_size_overrides.extend(overrides.clone());
        }
        if let Some(v) = server.prune_age_hours {
            self.prune_age_hours = v;
        }
        if let Some(v) = server.max_cached {
            self.max_cached = v;
        }
        if let Some(v) = server.retain_after_sent {
            self.retain_after_sent = v;
        }
        if let Some(v) = server.reauth_before_expiry {
            self.reauth_before_expiry = v;
        }
        if let Some(v) = server.reauth_interval_ms {
            self.reauth_interval_ms = v;
        }
        if let Some(mechanisms) = &server.auth_mechanisms {
            let mut keys: Vec<&String> = mechanisms.keys().collect();
            keys.sort();
            for key in keys {
                self.auth_mechanisms.set(key.clone(), mechanisms[key].clone());
            }
        }
    }
}

/// Configuration document pushed by the server.
///
/// Every field is optional; absent fields leave the local value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub retry_count: Option<u32>,
    pub retry_interval_ms: Option<u64>,
    pub batch_wait_ms: Option<u64>,
    pub straggler_timeout_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub batch_size_overrides: Option<HashMap<String, usize>>,
    pub prune_age_hours: Option<u64>,
    pub max_cached: Option<usize>,
    pub retain_after_sent: Option<bool>,
    pub reauth_before_expiry: Option<bool>,
    pub reauth_interval_ms: Option<u64>,
    pub auth_mechanisms: Option<HashMap<String, String>>,
    /// Ordered module sequence the client walks through, if the deployment
    /// defines one.
    pub modules: Option<Vec<crate::ModuleTarget>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.batch_size_for("event"), 25);
        assert!(config.auth_mechanisms.is_empty());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new().map_err(|e| Error::Value(e.to_string()))?;
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.retry_count = 7;
        config.batch_size_overrides.insert("log".to_string(), 100);
        config.save_to(&config_path)?;

        let loaded = Config::load_from(&config_path)?;
        assert_eq!(loaded.retry_count, 7);
        assert_eq!(loaded.batch_size_for("log"), 100);
        assert_eq!(loaded.batch_size_for("event"), 25);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_returns_default() -> Result<()> {
        let temp_dir = TempDir::new().map_err(|e| Error::Value(e.to_string()))?;
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path)?;
        assert_eq!(config.retry_count, Config::default().retry_count);

        Ok(())
    }

    #[test]
    fn test_merge_server_overrides_and_mechanisms() {
        let mut config = Config::default();
        let server = ServerConfig {
            batch_size: Some(50),
            auth_mechanisms: Some(HashMap::from([(
                "otp".to_string(),
                "6-digit".to_string(),
            )])),
            ..Default::default()
        };

        config.merge_server(&server);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.auth_mechanisms.get("otp"), Some("6-digit"));
        // Untouched fields keep their local values.
        assert_eq!(config.retry_count, 3);
    }
}
