//! Validation configuration
//!
//! [`ValidationOptions`] travel with each task; [`ValidationSettings`] are
//! engine-wide. Together they resolve into the [`ValidationConfig`] a single
//! validation run uses.

use crate::templates::{CommandTemplates, LanguageCommands};
use gte_syntax::Language;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-command timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which tiers a task wants and any per-task command overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Run the lint tier
    pub run_linter: bool,
    /// Run the tests tier
    pub run_tests: bool,
    /// Run the type-check tier
    pub run_type_check: bool,
    /// Test files or selectors substituted for `{scope}`
    pub test_scope: Vec<String>,
    /// Templates overriding the engine-wide ones for this task
    pub commands: LanguageCommands,
}

impl ValidationOptions {
    /// Syntax only
    #[inline]
    #[must_use]
    pub fn syntax_only() -> Self {
        Self::default()
    }

    /// All tiers
    #[must_use]
    pub fn all() -> Self {
        Self {
            run_linter: true,
            run_tests: true,
            run_type_check: true,
            ..Self::default()
        }
    }

    /// Resolve against engine settings for one file
    #[must_use]
    pub fn resolve(&self, file: &Path, settings: &ValidationSettings) -> ValidationConfig {
        let language = Language::from_path(file);
        let defaults = language
            .and_then(|l| settings.templates.get(l.name()))
            .cloned()
            .unwrap_or_default();
        let commands = self.commands.clone().or(&defaults);

        ValidationConfig {
            language,
            commands,
            run_linter: self.run_linter,
            run_tests: self.run_tests,
            run_type_check: self.run_type_check,
            test_scope: self.test_scope.clone(),
            timeout: settings.timeout(),
        }
    }
}

/// Engine-wide validation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Per-command timeout in seconds
    pub timeout_secs: u64,
    /// Language name → command templates
    pub templates: CommandTemplates,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            templates: CommandTemplates::default(),
        }
    }
}

impl ValidationSettings {
    /// Per-command timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything one validation run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Grammar for the built-in syntax check, if known
    pub language: Option<Language>,
    /// Resolved command templates
    pub commands: LanguageCommands,
    /// Run the lint tier
    pub run_linter: bool,
    /// Run the tests tier
    pub run_tests: bool,
    /// Run the type-check tier
    pub run_type_check: bool,
    /// `{scope}` entries
    pub test_scope: Vec<String>,
    /// Per-command timeout
    pub timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            language: None,
            commands: LanguageCommands::default(),
            run_linter: false,
            run_tests: false,
            run_type_check: false,
            test_scope: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ValidationConfig {
    /// Config for a language with no external commands
    #[must_use]
    pub fn for_language(language: Language) -> Self {
        Self {
            language: Some(language),
            ..Self::default()
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_language_defaults() {
        let opts = ValidationOptions {
            run_tests: true,
            test_scope: vec!["tests/test_calc.py".into()],
            ..ValidationOptions::default()
        };
        let config = opts.resolve(Path::new("src/calc.py"), &ValidationSettings::default());
        assert_eq!(config.language, Some(Language::Python));
        assert_eq!(config.commands.test.as_deref(), Some("pytest -q {scope}"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.run_tests && !config.run_linter);
    }

    #[test]
    fn unknown_extension_has_no_commands() {
        let config = ValidationOptions::all().resolve(Path::new("notes.txt"), &ValidationSettings::default());
        assert_eq!(config.language, None);
        assert_eq!(config.commands, LanguageCommands::default());
    }

    #[test]
    fn settings_deserialize_partially() {
        let settings: ValidationSettings = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert!(settings.templates.get("python").is_some());
    }
}
