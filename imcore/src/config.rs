use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Ambient service configuration: everything outside the core's own
/// component boundaries — database url, HTTP bind address, upstream
/// collaborators. Grounded on `runelink-server/src/config.rs`'s
/// TOML-file-plus-env-override loader.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub contact_service_url: String,
    pub idp_introspect_url: String,
    #[serde(default = "default_idp_cache_ttl_secs")]
    pub idp_cache_ttl_secs: u64,
    #[serde(default = "default_app_cache_ttl_secs")]
    pub app_cache_ttl_secs: u64,
    #[serde(default = "default_token_length")]
    pub default_token_length: usize,
}

fn default_idp_cache_ttl_secs() -> u64 {
    60
}

fn default_app_cache_ttl_secs() -> u64 {
    300
}

fn default_token_length() -> usize {
    64
}

impl ServiceConfig {
    pub fn idp_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.idp_cache_ttl_secs)
    }

    pub fn app_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.app_cache_ttl_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseConfigFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
}

impl ServiceConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::ReadConfigFile {
            path: path_ref.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::ParseConfigFile {
            path: path_ref.display().to_string(),
            source,
        })
    }

    /// Overlays environment variables onto an already-loaded config,
    /// mirroring the teacher's pattern of TOML-as-base, env-as-override.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(bind_addr) = std::env::var("IMCORE_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            self.database_url = database_url;
        }
        self
    }
}
