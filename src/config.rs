// Runtime configuration for the CLI and the dashboard server.
//
// Resolution order: JSON config file (FINANCE_DASHBOARD_CONFIG, falling back
// to <data-dir>/config.json when present) -> environment overrides -> defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Default bind address for the dashboard server
pub const DEFAULT_BIND: &str = "0.0.0.0:8050";

pub const CONFIG_ENV: &str = "FINANCE_DASHBOARD_CONFIG";
pub const DB_ENV: &str = "FINANCE_DASHBOARD_DB";
pub const BIND_ENV: &str = "FINANCE_DASHBOARD_BIND";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Address the dashboard server binds to
    pub bind: String,

    /// Directory served under /static
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            bind: DEFAULT_BIND.to_string(),
            static_dir: PathBuf::from("web"),
        }
    }
}

/// Application data directory (platform data dir, falling back to cwd)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("finance-dashboard")
}

pub fn default_db_path() -> PathBuf {
    default_data_dir().join("spending.db")
}

impl Config {
    /// Load configuration: file (if any), then environment overrides
    pub fn load() -> Result<Config> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Config::from_file(Path::new(&path))?,
            Err(_) => {
                let default_file = default_data_dir().join("config.json");
                if default_file.exists() {
                    Config::from_file(&default_file)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(db_path) = env::var(DB_ENV) {
            config.db_path = PathBuf::from(db_path);
        }

        if let Ok(bind) = env::var(BIND_ENV) {
            config.bind = bind;
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        Ok(config)
    }

    /// Create the directory the database lives in, if needed
    pub fn ensure_data_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.bind, DEFAULT_BIND);
        assert!(config.db_path.ends_with("spending.db"));
        assert_eq!(config.static_dir, PathBuf::from("web"));
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"bind": "127.0.0.1:9000"}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();

        // Overridden field
        assert_eq!(config.bind, "127.0.0.1:9000");
        // Untouched fields keep their defaults
        assert!(config.db_path.ends_with("spending.db"));
    }

    #[test]
    fn test_from_file_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("read"));
    }
}
