//! Engine configuration
//!
//! ```toml
//! [orchestrator]
//! max_parallel = 4
//! default_max_retries = 2
//! retry_policy = { strategy = "fixed", delay_ms = 2000 }
//!
//! [patch]
//! symbol_threshold = 0.8
//!
//! [validation]
//! timeout_secs = 60
//!
//! [isolation]
//! enabled = true
//! repo_path = "."
//! branch_prefix = "fix/"
//! ```

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::types::{FixTask, TaskFile, DEFAULT_MAX_RETRIES};
use gte_isolation::IsolationSettings;
use gte_patch::PatchConfig;
use gte_sandbox::ValidationSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of tasks in flight
pub const DEFAULT_MAX_PARALLEL: usize = 3;

/// Concurrency and retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tasks in flight at once within a batch
    pub max_parallel: usize,
    /// Backoff between attempts
    pub retry_policy: RetryPolicy,
    /// Retry budget applied to tasks loaded from files that do not set one
    pub default_max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            retry_policy: RetryPolicy::default(),
            default_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl OrchestratorConfig {
    /// With max parallel tasks
    #[inline]
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

/// Git isolation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Put each task on its own branch and commit successes
    pub enabled: bool,
    /// Repository to work in; the current directory if unset
    pub repo_path: Option<PathBuf>,
    /// Branch naming and commit identity
    #[serde(flatten)]
    pub settings: IsolationSettings,
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduling and retries
    pub orchestrator: OrchestratorConfig,
    /// Patch matching thresholds
    pub patch: PatchConfig,
    /// Validation timeouts and command templates
    pub validation: ValidationSettings,
    /// Git isolation
    pub isolation: IsolationConfig,
}

impl EngineConfig {
    /// Load from a `.toml`, `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load(path)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns [`ConfigError`] on invalid syntax or values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML
    ///
    /// # Errors
    /// Returns [`ConfigError`] on invalid syntax or values.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.max_parallel must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("patch.symbol_threshold", self.patch.symbol_threshold),
            ("patch.text_threshold", self.patch.text_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.validation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "validation.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TaskFile {
    /// Load tasks from a `.toml`, `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file: Self = load(path)?;
        tracing::debug!(path = %path.display(), tasks = file.tasks.len(), "Task file loaded");
        Ok(file)
    }

    /// Give every task with the stock retry budget `max_retries` instead
    #[must_use]
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        for task in &mut self.tasks {
            if task.max_retries == DEFAULT_MAX_RETRIES {
                task.max_retries = max_retries;
            }
        }
        self
    }

    /// Tasks in file order
    #[must_use]
    pub fn into_tasks(self) -> Vec<FixTask> {
        self.tasks
    }
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("toml") => Ok(toml::from_str(&text)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
        Some("json") => Ok(serde_json::from_str(&text)?),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_round_trip_through_toml_and_yaml() {
        let config = EngineConfig::default();
        let toml_text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&toml_text).unwrap(), config);

        let yaml_text = serde_yaml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_yaml_str(&yaml_text).unwrap(), config);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[orchestrator]
max_parallel = 8
retry_policy = { strategy = "fixed", delay_ms = 250 }

[isolation]
enabled = true
branch_prefix = "fix/"
"#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_parallel, 8);
        assert_eq!(
            config.orchestrator.retry_policy,
            RetryPolicy::Fixed { delay_ms: 250 }
        );
        assert_eq!(config.orchestrator.default_max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.isolation.enabled);
        assert_eq!(config.isolation.settings.branch_prefix, "fix/");
        assert_eq!(config.isolation.settings.bot_name, "GTE Bot");
        assert_eq!(config.patch, PatchConfig::default());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let err = EngineConfig::from_yaml_str("orchestrator:\n  max_parallel: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            EngineConfig::from_path(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn task_file_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"{"tasks": [
                {"id": "a", "issue": {"file_path": "a.py", "rule_id": "R1"}, "priority": 2.0},
                {"id": "b", "issue": {"file_path": "b.py", "rule_id": "R1"}, "dependencies": ["a"], "max_retries": 1}
            ]}"#,
        )
        .unwrap();
        let tasks = TaskFile::from_path(&path)
            .unwrap()
            .with_default_max_retries(5)
            .into_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].max_retries, 5);
        assert_eq!(tasks[1].max_retries, 1);
        assert_eq!(tasks[1].dependencies, vec![gte_kernel::TaskId::new("a")]);
    }
}
