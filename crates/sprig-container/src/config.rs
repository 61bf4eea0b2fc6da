//! Container settings and their loader

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sprig_core::LoggingConfig;

use crate::error::{ContainerError, Result};

/// Behavioural switches of a [`Container`](crate::Container)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Resolve setter cycles between singletons through early references
    pub allow_circular_references: bool,
    /// Keep going when a raw early reference was injected but the final object is a wrapper
    pub allow_raw_injection_despite_wrapping: bool,
    /// Registering a descriptor under an existing name replaces it
    pub allow_descriptor_overriding: bool,
    /// Keep the first of several equally weighted constructors instead of failing
    pub lenient_constructor_resolution: bool,
    /// Type lookups may create components to find out their type
    pub allow_eager_init: bool,
    pub logging: LoggingConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            allow_descriptor_overriding: true,
            lenient_constructor_resolution: true,
            allow_eager_init: true,
            logging: LoggingConfig::default(),
        }
    }
}

/// Loads [`ContainerConfig`] from an optional TOML file and the environment.
///
/// Environment variables use the prefix (default `SPRIG`) and `__` as separator:
/// `SPRIG__ALLOW_CIRCULAR_REFERENCES=false`, `SPRIG__LOGGING__LEVEL=debug`.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "SPRIG".to_string(),
        }
    }

    /// Also read `path`; a missing file is not an error
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<ContainerConfig> {
        let mut builder = Config::builder();
        if let Some(path) = &self.config_path {
            builder = builder.add_source(File::from(path.clone()).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let container_config: ContainerConfig = config.try_deserialize()?;
        self.validate(&container_config)?;
        Ok(container_config)
    }

    pub fn save(&self, config: &ContainerConfig, path: &Path) -> Result<()> {
        let toml = toml::to_string(config)
            .map_err(|e| ContainerError::Validation(format!("Cannot serialize configuration: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml)?;
        Ok(())
    }

    pub fn validate(&self, config: &ContainerConfig) -> Result<()> {
        if config.allow_raw_injection_despite_wrapping && !config.allow_circular_references {
            return Err(ContainerError::Validation(
                "allow_raw_injection_despite_wrapping requires allow_circular_references"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::LogLevel;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert!(config.allow_circular_references);
        assert!(!config.allow_raw_injection_despite_wrapping);
        assert!(config.lenient_constructor_resolution);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "allow_circular_references = false\nlenient_constructor_resolution = false\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_path(file.path())
            .with_env_prefix("SPRIG_TEST_FILE")
            .load()
            .unwrap();
        assert!(!config.allow_circular_references);
        assert!(!config.lenient_constructor_resolution);
        assert!(config.allow_descriptor_overriding);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_path(dir.path().join("absent.toml"))
            .with_env_prefix("SPRIG_TEST_ABSENT")
            .load()
            .unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("SPRIG_TEST_ENV__ALLOW_EAGER_INIT", "false");
        let config = ConfigLoader::new()
            .with_env_prefix("SPRIG_TEST_ENV")
            .load()
            .unwrap();
        std::env::remove_var("SPRIG_TEST_ENV__ALLOW_EAGER_INIT");
        assert!(!config.allow_eager_init);
    }

    #[test]
    fn test_validation() {
        let config = ContainerConfig {
            allow_circular_references: false,
            allow_raw_injection_despite_wrapping: true,
            ..ContainerConfig::default()
        };
        assert!(matches!(
            ConfigLoader::new().validate(&config),
            Err(ContainerError::Validation(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sprig.toml");
        let config = ContainerConfig {
            allow_descriptor_overriding: false,
            ..ContainerConfig::default()
        };
        let loader = ConfigLoader::new().with_path(&path).with_env_prefix("SPRIG_TEST_SAVE");
        loader.save(&config, &path).unwrap();
        assert_eq!(loader.load().unwrap(), config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ContainerConfig =
            serde_json::from_str(r#"{"allow_eager_init": false, "logging": {"level": "warn"}}"#)
                .unwrap();
        assert!(!config.allow_eager_init);
        assert!(config.allow_circular_references);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }
}
