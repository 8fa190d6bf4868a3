use chrono::Duration;
use thiserror::Error;

/// Upper bound for any configured lifetime (ten years)
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tokens: TokenConfig,
    /// JSON user directory consulted when binding users; `None` projects `{"id": key}`
    pub users_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
}

/// Shape of freshly minted keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyFormat {
    Hex,
    #[default]
    Uuid,
}

/// Lifetimes of every record kind, in seconds
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_ttl_seconds: u64,
    /// Reaper period; 0 disables the reaper
    pub cleanup_interval_seconds: u64,
    pub identifier_ttl_seconds: u64,
    pub key_format: KeyFormat,
    /// A record this close to expiry is already treated as expired
    pub time_delta_seconds: u64,
    pub update_ttl_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_seconds: 30,
            cleanup_interval_seconds: 60,
            identifier_ttl_seconds: 45,
            key_format: KeyFormat::Uuid,
            time_delta_seconds: 1,
            update_ttl_seconds: 60,
        }
    }
}

impl TokenConfig {
    pub fn access_ttl(&self) -> Duration {
        seconds(self.access_ttl_seconds)
    }

    pub fn identifier_ttl(&self) -> Duration {
        seconds(self.identifier_ttl_seconds)
    }

    pub fn time_delta(&self) -> Duration {
        seconds(self.time_delta_seconds)
    }

    pub fn update_ttl(&self) -> Duration {
        seconds(self.update_ttl_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, ttl) in [
            ("IDENTIFIER_TTL_SECONDS", self.identifier_ttl_seconds),
            ("ACCESS_TTL_SECONDS", self.access_ttl_seconds),
            ("UPDATE_TTL_SECONDS", self.update_ttl_seconds),
        ] {
            if ttl == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
            if ttl > MAX_TTL_SECONDS {
                return Err(ConfigError::ValidationError(format!(
                    "{name} cannot exceed {MAX_TTL_SECONDS}"
                )));
            }
            if ttl <= self.time_delta_seconds {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than TIME_DELTA_SECONDS ({})",
                    self.time_delta_seconds
                )));
            }
        }

        if self.update_ttl_seconds < self.access_ttl_seconds {
            return Err(ConfigError::ValidationError(
                "UPDATE_TTL_SECONDS cannot be shorter than ACCESS_TTL_SECONDS".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5011".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn load_from<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |name: &str, default: u64| -> u64 {
            var(name)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let defaults = TokenConfig::default();

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5011".to_string());
        let data_dir = var("DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let backend = var("STORAGE_BACKEND")
            .map(|s| match s.to_lowercase().as_str() {
                "redb" => StorageBackend::Redb,
                _ => StorageBackend::Memory,
            })
            .unwrap_or_default();

        let key_format = var("KEY_FORMAT")
            .map(|s| match s.to_lowercase().as_str() {
                "hex" => KeyFormat::Hex,
                _ => KeyFormat::Uuid,
            })
            .unwrap_or_default();

        let users_file = var("USERS_FILE").filter(|s| !s.trim().is_empty());

        let config = Config {
            server: ServerConfig { bind_address },
            storage: StorageConfig { backend, data_dir },
            tokens: TokenConfig {
                access_ttl_seconds: parse_u64("ACCESS_TTL_SECONDS", defaults.access_ttl_seconds),
                cleanup_interval_seconds: parse_u64(
                    "CLEANUP_INTERVAL_SECONDS",
                    defaults.cleanup_interval_seconds,
                ),
                identifier_ttl_seconds: parse_u64(
                    "IDENTIFIER_TTL_SECONDS",
                    defaults.identifier_ttl_seconds,
                ),
                key_format,
                time_delta_seconds: parse_u64("TIME_DELTA_SECONDS", defaults.time_delta_seconds),
                update_ttl_seconds: parse_u64("UPDATE_TTL_SECONDS", defaults.update_ttl_seconds),
            },
            users_file,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "BIND_ADDRESS cannot be empty".to_string(),
            ));
        }

        self.tokens.validate()?;

        if self.tokens.cleanup_interval_seconds == 0 {
            tracing::warn!("Reaper disabled; stale records will accumulate until overwritten");
        }

        Ok(())
    }
}

fn seconds(value: u64) -> Duration {
    i64::try_from(value.min(MAX_TTL_SECONDS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load_from(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:5011");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.tokens.identifier_ttl_seconds, 45);
        assert_eq!(config.tokens.access_ttl_seconds, 30);
        assert_eq!(config.tokens.update_ttl_seconds, 60);
        assert_eq!(config.tokens.time_delta_seconds, 1);
        assert_eq!(config.tokens.key_format, KeyFormat::Uuid);
        assert!(config.users_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STORAGE_BACKEND", "REDB"),
            ("DATA_DIR", "/var/lib/simple-auth"),
            ("ACCESS_TTL_SECONDS", "300"),
            ("UPDATE_TTL_SECONDS", "3600"),
            ("KEY_FORMAT", "hex"),
            ("USERS_FILE", "users.json"),
        ])
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Redb);
        assert_eq!(config.storage.data_dir, "/var/lib/simple-auth");
        assert_eq!(config.tokens.access_ttl(), Duration::seconds(300));
        assert_eq!(config.tokens.update_ttl(), Duration::seconds(3600));
        assert_eq!(config.tokens.key_format, KeyFormat::Hex);
        assert_eq!(config.users_file.as_deref(), Some("users.json"));
    }

    #[test]
    fn test_unparseable_numbers_fall_back_to_defaults() {
        let config = load(&[("ACCESS_TTL_SECONDS", "soon")]).unwrap();
        assert_eq!(config.tokens.access_ttl_seconds, 30);
    }

    #[test]
    fn test_rejects_ttl_within_margin() {
        assert!(load(&[("TIME_DELTA_SECONDS", "30")]).is_err());
        assert!(load(&[("IDENTIFIER_TTL_SECONDS", "0")]).is_err());
        assert!(load(&[("UPDATE_TTL_SECONDS", "99999999999")]).is_err());
    }

    #[test]
    fn test_rejects_update_shorter_than_access() {
        assert!(load(&[("ACCESS_TTL_SECONDS", "120")]).is_err());
    }
}
