use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{definition::ChainDefinition, error::RuntimeError};

/// Runtime configuration file: settings plus the chain definitions to load
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub chains:  Vec<ChainDefinition>
}

/// Sizing and timing of the processing runtime
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Maximum number of nested chains per message
    pub stack_depth:      usize,
    /// Processor workers in the pool
    pub workers:          usize,
    /// Receivers a worker runs before handing the message back to the queue
    pub steps_per_task:   usize,
    /// How long a paused message waits to be resumed
    pub pause_timeout_ms: u64,
    /// How long `MessageBus::process` waits for a report
    pub call_timeout_ms:  u64,
    /// Receivers one message may run before it fails with a timeout
    pub max_steps:        u64
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            stack_depth:      5,
            workers:          4,
            steps_per_task:   64,
            pause_timeout_ms: 30_000,
            call_timeout_ms:  30_000,
            max_steps:        100_000
        }
    }
}

impl RuntimeSettings {
    pub fn pause_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Every setting must be non-zero
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let zero = [
            ("stack_depth", self.stack_depth as u64),
            ("workers", self.workers as u64),
            ("steps_per_task", self.steps_per_task as u64),
            ("pause_timeout_ms", self.pause_timeout_ms),
            ("call_timeout_ms", self.call_timeout_ms),
            ("max_steps", self.max_steps)
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(RuntimeError::InvalidConfiguration(format!("{} must be greater than zero", name))),
            None => Ok(())
        }
    }
}

impl AppConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.runtime.validate()?;
        Ok(config)
    }

    /// Save configuration to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Starter configuration with a small example chain
    pub fn example() -> Result<Self> {
        let chains = serde_yaml::from_str(EXAMPLE_CHAINS).context("Failed to parse example chains")?;
        Ok(Self { runtime: RuntimeSettings::default(), chains })
    }
}

const EXAMPLE_CHAINS: &str = r#"
- name: main
  steps:
    - receiver: set
      arguments: { field: greeting, value: hello }
    - receiver: call_chain
      arguments: { chain: audit }
    - receiver: log
  exceptional:
    - fault: "*"
      chain: on_error
      after: end
- name: audit
  steps:
    - receiver: set
      arguments: { target: context, field: audited, value: true }
- name: on_error
  steps:
    - receiver: log
      arguments: { label: on_error }
"#;

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "chain-runtime").context("Failed to determine project directories")
}

/// Get the configuration directory path
pub fn get_config_dir() -> Result<PathBuf> {
    let project_dirs = get_project_dirs()?;
    Ok(project_dirs.config_dir().to_path_buf())
}

/// Get the default config file path
pub fn get_config_file_path() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join("config.yaml"))
}

/// Write the example configuration to `path` unless a file is already there.
///
/// Returns whether a file was written.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    AppConfig::example()?.save(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::adapter::registry::{AfterActionTable, InMemoryChainRegistry, ReceiverTable};

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = serde_yaml::from_str("runtime:\n  workers: 2\n").unwrap();

        assert_eq!(config.runtime.workers, 2);
        assert_eq!(config.runtime.stack_depth, 5);
        assert_eq!(config.runtime.max_steps, 100_000);
        assert_eq!(config.runtime.pause_timeout(), Duration::from_secs(30));
        assert!(config.chains.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_settings() {
        let settings = RuntimeSettings { steps_per_task: 0, ..RuntimeSettings::default() };

        let result = settings.validate();

        assert!(matches!(result, Err(RuntimeError::InvalidConfiguration(msg)) if msg.contains("steps_per_task")));
        assert!(RuntimeSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_step_limit() {
        let settings = RuntimeSettings { max_steps: 0, ..RuntimeSettings::default() };

        let result = settings.validate();

        assert!(matches!(result, Err(RuntimeError::InvalidConfiguration(msg)) if msg.contains("max_steps")));
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        let config = AppConfig::example().unwrap();
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_reports_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "runtime:\n  stack_depth: 0\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();

        assert!(format!("{:#}", err).contains("stack_depth"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        let err = AppConfig::load(&temp_dir.path().join("absent.yaml")).unwrap_err();

        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        assert!(init_config(&path).unwrap());
        fs::write(&path, "chains: []\n").unwrap();
        assert!(!init_config(&path).unwrap());

        assert!(AppConfig::load(&path).unwrap().chains.is_empty());
    }

    #[test]
    fn test_example_chains_build() {
        let config = AppConfig::example().unwrap();

        let registry =
            InMemoryChainRegistry::build(&config.chains, &ReceiverTable::with_builtins(), &AfterActionTable::new())
                .unwrap();

        assert_eq!(registry.len(), 3);
    }
}
