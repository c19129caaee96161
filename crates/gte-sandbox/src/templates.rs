//! Per-language check command templates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Command templates for one language
///
/// Each template carries one placeholder, `{file}` or `{scope}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageCommands {
    /// Syntax/compile check, `{file}`
    pub syntax: Option<String>,
    /// Linter, `{file}`
    pub lint: Option<String>,
    /// Test runner, `{scope}`
    pub test: Option<String>,
    /// Type checker, `{file}`
    pub type_check: Option<String>,
}

impl LanguageCommands {
    /// Fill unset templates from `fallback`
    #[must_use]
    pub fn or(self, fallback: &LanguageCommands) -> Self {
        Self {
            syntax: self.syntax.or_else(|| fallback.syntax.clone()),
            lint: self.lint.or_else(|| fallback.lint.clone()),
            test: self.test.or_else(|| fallback.test.clone()),
            type_check: self.type_check.or_else(|| fallback.type_check.clone()),
        }
    }
}

fn commands(
    syntax: Option<&str>,
    lint: Option<&str>,
    test: Option<&str>,
    type_check: Option<&str>,
) -> LanguageCommands {
    LanguageCommands {
        syntax: syntax.map(str::to_string),
        lint: lint.map(str::to_string),
        test: test.map(str::to_string),
        type_check: type_check.map(str::to_string),
    }
}

/// Language name → command templates
///
/// Keys are [`gte_syntax::Language::name`] values. Configured maps replace
/// the defaults per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplates(BTreeMap<String, LanguageCommands>);

impl Default for CommandTemplates {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "python".to_string(),
            commands(
                Some("python3 -m py_compile {file}"),
                Some("ruff check {file}"),
                Some("pytest -q {scope}"),
                Some("mypy {file}"),
            ),
        );
        map.insert(
            "go".to_string(),
            commands(Some("gofmt -e -l {file}"), Some("go vet {file}"), Some("go test {scope}"), None),
        );
        map.insert(
            "rust".to_string(),
            commands(None, Some("rustfmt --edition 2021 --check {file}"), None, None),
        );
        map.insert(
            "typescript".to_string(),
            commands(
                None,
                Some("eslint {file}"),
                Some("npx jest {scope}"),
                Some("tsc --noEmit {file}"),
            ),
        );
        map.insert(
            "javascript".to_string(),
            commands(Some("node --check {file}"), Some("eslint {file}"), Some("npx jest {scope}"), None),
        );
        Self(map)
    }
}

impl CommandTemplates {
    /// Empty table: only tree-sitter syntax checks will run
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Templates for a language name
    #[inline]
    #[must_use]
    pub fn get(&self, language: &str) -> Option<&LanguageCommands> {
        self.0.get(language)
    }

    /// Set templates for a language
    pub fn insert(&mut self, language: impl Into<String>, commands: LanguageCommands) {
        self.0.insert(language.into(), commands);
    }

    /// Builder form of [`Self::insert`]
    #[must_use]
    pub fn with(mut self, language: impl Into<String>, commands: LanguageCommands) -> Self {
        self.insert(language, commands);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_python_and_go() {
        let templates = CommandTemplates::default();
        let py = templates.get("python").unwrap();
        assert_eq!(py.syntax.as_deref(), Some("python3 -m py_compile {file}"));
        assert!(py.test.as_deref().unwrap().contains("{scope}"));
        assert!(templates.get("go").unwrap().type_check.is_none());
        assert!(templates.get("cobol").is_none());
    }

    #[test]
    fn overrides_fall_back_per_field() {
        let defaults = CommandTemplates::default();
        let task = LanguageCommands {
            test: Some("pytest -x {scope}".into()),
            ..LanguageCommands::default()
        };
        let merged = task.or(defaults.get("python").unwrap());
        assert_eq!(merged.test.as_deref(), Some("pytest -x {scope}"));
        assert_eq!(merged.lint.as_deref(), Some("ruff check {file}"));
    }

    #[test]
    fn toml_table_round_trip() {
        let text = "[python]\nsyntax = \"python3 -m py_compile {file}\"\n";
        let templates: CommandTemplates = toml::from_str(text).unwrap();
        assert_eq!(templates.get("python").unwrap().lint, None);
    }
}
