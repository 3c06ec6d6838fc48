//! Configuration management with file persistence

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Error;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SQL_PANCAKE_CONFIG_DIR";

/// sql-pancake configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub shell: ShellConfig,
    pub logging: LoggingConfig,
}

/// Connection settings applied every time a database is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub foreign_keys: bool,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Persist interactive input history between sessions.
    pub history: bool,
    pub banner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history: true,
            banner: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber, writing to stderr. `RUST_LOG` wins
    /// over the configured level.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const KEYS: [&str; 5] = [
    "database.foreign_keys",
    "database.busy_timeout_ms",
    "shell.history",
    "shell.banner",
    "logging.level",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("sql-pancake")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Location of the interactive shell history file.
    pub fn history_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("history.txt"))
    }

    /// Load configuration from the default location, or defaults if no file exists
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        EnvFilter::try_new(&self.logging.level).map_err(|e| {
            Error::Config(format!("invalid logging.level '{}': {}", self.logging.level, e))
        })?;
        // rusqlite takes the busy timeout as a c_int of milliseconds
        if self.database.busy_timeout_ms > i32::MAX as u64 {
            return Err(Error::Config(format!(
                "database.busy_timeout_ms must be at most {}, got {}",
                i32::MAX,
                self.database.busy_timeout_ms
            ))
            .into());
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.foreign_keys" => Ok(self.database.foreign_keys.to_string()),
            "database.busy_timeout_ms" => Ok(self.database.busy_timeout_ms.to_string()),
            "shell.history" => Ok(self.shell.history.to_string()),
            "shell.banner" => Ok(self.shell.banner.to_string()),
            "logging.level" => Ok(self.logging.level.clone()),
            _ => Err(unknown_key(key)),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.foreign_keys" => self.database.foreign_keys = parse_bool(key, value)?,
            "database.busy_timeout_ms" => {
                self.database.busy_timeout_ms = value.parse().map_err(|_| {
                    Error::Config(format!("{} expects milliseconds, got '{}'", key, value))
                })?
            }
            "shell.history" => self.shell.history = parse_bool(key, value)?,
            "shell.banner" => self.shell.banner = parse_bool(key, value)?,
            "logging.level" => self.logging.level = value.to_string(),
            _ => return Err(unknown_key(key)),
        }
        self.validate()
    }

    /// All configuration values as `(key, value)` pairs
    pub fn list(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).ok().map(|value| (*key, value)))
            .collect()
    }
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::Config(format!("{} expects true or false, got '{}'", key, value)).into()),
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    Error::Config(format!("Unknown config key: {}", key)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_enable_foreign_keys() {
        let config = Config::default();
        assert!(config.database.foreign_keys);
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database]\nforeign_keys = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.database.foreign_keys);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.shell.history);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("shell.banner", "off").unwrap();
        config.set("database.busy_timeout_ms", "250").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.shell.banner);
        assert_eq!(loaded.database.busy_timeout_ms, 250);
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("shell.history", "maybe").is_err());
        assert!(config.set("database.busy_timeout_ms", "soon").is_err());
        assert!(config.set("nope", "1").is_err());
        assert!(config.get("nope").is_err());

        assert!(config.set("database.busy_timeout_ms", "3000000000").is_err());

        let oversized = Config {
            database: DatabaseConfig {
                busy_timeout_ms: u64::from(u32::MAX),
                ..DatabaseConfig::default()
            },
            ..Config::default()
        };
        let dir = TempDir::new().unwrap();
        assert!(oversized.save_to(&dir.path().join("config.toml")).is_err());
    }

    #[test]
    fn oversized_busy_timeout_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database]\nbusy_timeout_ms = 3000000000\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }

    #[test]
    fn config_errors_carry_the_config_variant() {
        let err = Config::default().get("nope").unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert_eq!(err.code(), "E200");
        assert!(err.to_string().contains("Unknown config key: nope"));
    }

    #[test]
    fn list_covers_every_key() {
        let listed = Config::default().list();
        assert_eq!(listed.len(), KEYS.len());
        assert_eq!(listed[0], ("database.foreign_keys", "true".to_string()));
    }
}
