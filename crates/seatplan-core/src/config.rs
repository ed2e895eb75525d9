//! seatplan.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatplanConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `seatplan.redb`.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single assignment run, commit included.
    pub run_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/seatplan"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8480 }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,seatpland=debug,seatplan=debug".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("seatplan.redb")
    }
}

impl EngineConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl SeatplanConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SeatplanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: SeatplanConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8480);
        assert_eq!(config.engine.run_timeout_secs, 120);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(
            config.storage.db_path(),
            PathBuf::from("/var/lib/seatplan/seatplan.redb")
        );
    }

    #[test]
    fn parse_partial_sections() {
        let toml_str = r#"
[server]
port = 9000

[logging]
filter = "warn"
format = "json"
"#;
        let config: SeatplanConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
        // Untouched sections keep defaults.
        assert_eq!(config.engine.run_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seatplan.toml");

        let mut config = SeatplanConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.engine.run_timeout_secs = 5;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = SeatplanConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.engine.run_timeout_secs, 5);
        assert_eq!(loaded.storage.data_dir, dir.path());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = SeatplanConfig::load(Some(Path::new("/nonexistent/seatplan.toml")));
        assert!(result.is_err());
    }
}
