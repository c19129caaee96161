//! Validation results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Validation tier, ordered as executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Parse/compile check, always run
    Syntax,
    /// Static analysis
    Lint,
    /// Test execution
    Tests,
    /// Type checking
    TypeCheck,
}

impl Tier {
    /// Stable name used in reports (`"syntax"`, `"lint"`, `"tests"`, `"type_check"`)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Syntax => "syntax",
            Tier::Lint => "lint",
            Tier::Tests => "tests",
            Tier::TypeCheck => "type_check",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Tier passed
    pub passed: bool,
    /// Diagnostics or command output
    pub output: String,
    /// Time spent
    pub duration: Duration,
}

impl CheckOutcome {
    /// Passing outcome
    #[must_use]
    pub fn pass(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            passed: true,
            output: output.into(),
            duration,
        }
    }

    /// Failing outcome
    #[must_use]
    pub fn fail(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            passed: false,
            output: output.into(),
            duration,
        }
    }
}

/// Result of validating one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Every tier that ran passed
    pub passed: bool,
    /// Tiers that ran, in execution order
    pub checks: BTreeMap<Tier, CheckOutcome>,
}

impl ValidationResult {
    /// Record a tier
    pub fn record(&mut self, tier: Tier, outcome: CheckOutcome) {
        self.checks.insert(tier, outcome);
    }

    /// First failed tier
    #[must_use]
    pub fn failed_tier(&self) -> Option<Tier> {
        self.checks
            .iter()
            .find(|(_, outcome)| !outcome.passed)
            .map(|(tier, _)| *tier)
    }

    /// Output of the first failed tier
    #[must_use]
    pub fn failure_output(&self) -> Option<&str> {
        self.checks
            .values()
            .find(|outcome| !outcome.passed)
            .map(|outcome| outcome.output.as_str())
    }

    /// Whether a tier ran
    #[inline]
    #[must_use]
    pub fn ran(&self, tier: Tier) -> bool {
        self.checks.contains_key(&tier)
    }

    /// One-line summary for error messages
    #[must_use]
    pub fn summary(&self) -> String {
        match self.failed_tier() {
            None => "all checks passed".to_string(),
            Some(tier) => {
                let first_line = self
                    .failure_output()
                    .and_then(|o| o.lines().next())
                    .unwrap_or_default();
                format!("{tier} check failed: {first_line}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_iterate_in_execution_order() {
        let mut result = ValidationResult::default();
        result.record(Tier::TypeCheck, CheckOutcome::fail("bad type", Duration::ZERO));
        result.record(Tier::Syntax, CheckOutcome::pass("", Duration::ZERO));
        result.record(Tier::Lint, CheckOutcome::fail("E501", Duration::ZERO));

        let order: Vec<_> = result.checks.keys().copied().collect();
        assert_eq!(order, vec![Tier::Syntax, Tier::Lint, Tier::TypeCheck]);
        assert_eq!(result.failed_tier(), Some(Tier::Lint));
        assert_eq!(result.summary(), "lint check failed: E501");
    }

    #[test]
    fn tier_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Tier::TypeCheck).unwrap(), "\"type_check\"");
        assert_eq!(Tier::Tests.to_string(), "tests");
    }
}
