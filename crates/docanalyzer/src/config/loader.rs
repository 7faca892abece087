use std::path::{Path, PathBuf};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

pub const ENV_WORKER_CONCURRENCY: &str = "WORKER_CONCURRENCY";
pub const ENV_QUEUE_CAPACITY: &str = "QUEUE_CAPACITY";
pub const ENV_DATA_DIR: &str = "DOCANALYZER_DATA_DIR";
pub const ENV_DATABASE_PATH: &str = "DOCANALYZER_DATABASE_PATH";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses a JSON config, applies environment overrides and validates.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

impl Config {
    /// Defaults plus environment overrides, for running without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        apply_env_overrides(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }
}

pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides from `lookup`. Blank values are ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(value) = get(ENV_WORKER_CONCURRENCY) {
        config.worker_count = parse_count(ENV_WORKER_CONCURRENCY, &value)?;
    }
    if let Some(value) = get(ENV_QUEUE_CAPACITY) {
        config.queue_capacity = parse_count(ENV_QUEUE_CAPACITY, &value)?;
    }
    if let Some(value) = get(ENV_DATA_DIR) {
        config.data_directory = PathBuf::from(value);
    }
    if let Some(value) = get(ENV_DATABASE_PATH) {
        config.database.path = PathBuf::from(value);
        config.database.enabled = true;
    }

    Ok(())
}

fn parse_count(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "queue_capacity must be at least 1".to_string(),
        });
    }

    if config.database.enabled && config.database.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "database.path must be set when the database is enabled".to_string(),
        });
    }

    Ok(())
}
