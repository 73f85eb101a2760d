use crate::menu::models::SubsystemId;
use crate::sync::SyncConfig;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "CAFETERIA_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Root of the menu API
	pub api_base_url: String,
	/// Per-request timeout in seconds
	pub request_timeout: u64,
	/// Directory holding the digest file and the menu snapshot
	pub data_dir: PathBuf,
	/// Subsystem (canteen) to sync
	pub subsystem_id: SubsystemId,
	pub sync: SyncConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			api_base_url: "http://localhost:8080/api/v1".to_string(),
			request_timeout: 30,
			data_dir: Self::default_data_dir(),
			subsystem_id: 1,
			sync: SyncConfig::default(),
		}
	}
}

impl Config {
	/// Load the config file at `path`, or the defaults when there is none.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let Some(path) = path else {
			return Ok(Self::default());
		};

		let contents = std::fs::read_to_string(path)
			.map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
		let config: Config = serde_json::from_str(&contents)
			.map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;

		if config.sync.max_concurrency == 0 {
			return Err(ConfigError::Invalid("sync.max_concurrency must be at least 1".to_string()));
		}
		Ok(config)
	}

	/// Load the file named by `CAFETERIA_CONFIG`, if set.
	pub fn from_env() -> Result<Self, ConfigError> {
		let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
		Self::load(path.as_deref())
	}

	/// Default data directory (platform-specific):
	/// - Linux: ~/.local/share/cafeteria-sync/
	/// - macOS: ~/Library/Application Support/cafeteria-sync/
	/// - Windows: %APPDATA%/cafeteria-sync/
	pub fn default_data_dir() -> PathBuf {
		dirs::data_dir()
			.unwrap_or_else(|| PathBuf::from("."))
			.join("cafeteria-sync")
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {0:?}: {1}")]
	ReadError(PathBuf, #[source] std::io::Error),

	#[error("Failed to parse config file {0:?}: {1}")]
	ParseError(PathBuf, #[source] serde_json::Error),

	#[error("Invalid config: {0}")]
	Invalid(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::tempdir;

	#[test]
	fn test_default_config() {
		let config = Config::default();
		assert_eq!(config.sync.max_concurrency, 16);
		assert_eq!(config.request_timeout(), Duration::from_secs(30));
		assert_eq!(config.data_dir, Config::default_data_dir());
		assert!(config.data_dir.ends_with("cafeteria-sync"));
	}

	#[test]
	fn test_load_without_path_uses_defaults() {
		let config = Config::load(None).unwrap();
		assert_eq!(config.subsystem_id, 1);
	}

	#[test]
	fn test_load_partial_file_keeps_defaults() {
		let temp_dir = tempdir().unwrap();
		let path = temp_dir.path().join("config.json");
		let mut file = std::fs::File::create(&path).unwrap();
		writeln!(file, r#"{{"subsystem_id": 12, "sync": {{"max_concurrency": 4}}}}"#).unwrap();

		let config = Config::load(Some(&path)).unwrap();
		assert_eq!(config.subsystem_id, 12);
		assert_eq!(config.sync.max_concurrency, 4);
		assert_eq!(config.request_timeout, 30);
	}

	#[test]
	fn test_missing_file_is_an_error() {
		let temp_dir = tempdir().unwrap();
		let path = temp_dir.path().join("nonexistent.json");
		assert!(matches!(Config::load(Some(&path)), Err(ConfigError::ReadError(..))));
	}

	#[test]
	fn test_zero_concurrency_is_rejected() {
		let temp_dir = tempdir().unwrap();
		let path = temp_dir.path().join("config.json");
		std::fs::write(&path, r#"{"sync": {"max_concurrency": 0}}"#).unwrap();
		assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Invalid(_))));
	}
}
