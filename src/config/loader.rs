//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery,
//! environment detection, and layering with environment variable overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::config::{Config, Environment, File};
use tracing::debug;

use super::BatchConfig;
use crate::error::Result;
use crate::logging::get_environment;

const CONFIG_FILE_STEM: &str = "tasker-batch";
const ENV_PREFIX: &str = "TASKER_BATCH";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: BatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading batch configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        debug!(
            environment = %environment,
            max_connections = config.database.max_connections,
            default_connection = %config.queue.default_connection,
            default_queue = %config.queue.default_queue,
            "Batch configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build(config_directory: &Path, environment: &str) -> Result<BatchConfig> {
        let base = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let overrides = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let config = Config::builder()
            .add_source(Config::try_from(&BatchConfig::default())?)
            .add_source(File::from(base).required(false))
            .add_source(File::from(overrides).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize::<BatchConfig>()?)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().join("absent")),
            "test",
        )
        .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().queue.default_queue, "default");
        assert_eq!(manager.config().database.max_connections, 10);
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tasker-batch.toml"),
            "[queue]\ndefault_connection = \"redis\"\ndefault_queue = \"batches\"\n\n[database]\nmax_connections = 4\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("tasker-batch.production.toml"),
            "[queue]\ndefault_queue = \"batches-prod\"\n\n[worker]\nskip_cancelled_jobs = false\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production")
                .unwrap();
        let config = manager.config();

        assert_eq!(config.queue.default_connection, "redis");
        assert_eq!(config.queue.default_queue, "batches-prod");
        assert_eq!(config.database.max_connections, 4);
        assert!(!config.worker.skip_cancelled_jobs);
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tasker-batch.toml"),
            "[database]\nmax_connections = 0\n",
        )
        .unwrap();

        let result = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }
}
