//! Sandbox validator
//!
//! Each run gets a fresh temporary directory holding only the candidate,
//! written under the original file name. The directory is removed when the
//! run ends, whatever the outcome.

use crate::command::{render, CommandRunner};
use crate::config::ValidationConfig;
use crate::error::SandboxError;
use crate::result::{CheckOutcome, Tier, ValidationResult};
use std::path::Path;
use std::time::{Duration, Instant};

/// Runs the validation tiers against candidate content
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxValidator;

impl SandboxValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate `candidate` as if it were `original_file`
    ///
    /// Tiers run in order: syntax, lint, tests, type check. A syntax failure
    /// returns immediately; later failures are recorded and the remaining
    /// tiers still run. The tests tier only runs with a non-empty test scope.
    ///
    /// # Errors
    /// Returns error only if the sandbox cannot be prepared. Failing or
    /// missing check commands are reported in the result.
    pub async fn validate(
        &self,
        candidate: &str,
        original_file: &Path,
        config: &ValidationConfig,
    ) -> Result<ValidationResult, SandboxError> {
        let file_name = original_file
            .file_name()
            .ok_or_else(|| SandboxError::InvalidTarget(original_file.to_path_buf()))?;
        let sandbox = tempfile::Builder::new()
            .prefix("gte-sandbox-")
            .tempdir()
            .map_err(|e| SandboxError::io_error(std::env::temp_dir(), e))?;
        let sandbox_file = sandbox.path().join(file_name);
        tokio::fs::write(&sandbox_file, candidate)
            .await
            .map_err(|e| SandboxError::io_error(&sandbox_file, e))?;

        let runner = CommandRunner::new(config.timeout);
        let mut result = ValidationResult::default();

        let syntax = self.check_syntax(candidate, &sandbox_file, config, &runner).await;
        let syntax_passed = syntax.passed;
        result.record(Tier::Syntax, syntax);
        if !syntax_passed {
            tracing::info!(file = %original_file.display(), stage = "syntax", "validation failed fast");
            result.passed = false;
            return Ok(result);
        }

        let commands = &config.commands;
        let optional_tiers = [
            (Tier::Lint, config.run_linter, commands.lint.as_deref()),
            (Tier::Tests, config.run_tests, commands.test.as_deref()),
            (Tier::TypeCheck, config.run_type_check, commands.type_check.as_deref()),
        ];
        for (tier, enabled, template) in optional_tiers {
            let Some(template) = template.filter(|_| enabled) else {
                continue;
            };
            if tier == Tier::Tests && config.test_scope.is_empty() {
                tracing::debug!(file = %original_file.display(), "no test scope, tests tier skipped");
                continue;
            }
            let outcome = run_template(template, &sandbox_file, &config.test_scope, sandbox.path(), &runner).await;
            if !outcome.passed {
                tracing::info!(file = %original_file.display(), stage = %tier, "check failed");
            }
            result.record(tier, outcome);
        }

        result.passed = result.checks.values().all(|c| c.passed);
        tracing::debug!(
            file = %original_file.display(),
            passed = result.passed,
            tiers = result.checks.len(),
            "validation finished"
        );
        Ok(result)
    }

    async fn check_syntax(
        &self,
        candidate: &str,
        sandbox_file: &Path,
        config: &ValidationConfig,
        runner: &CommandRunner,
    ) -> CheckOutcome {
        let started = Instant::now();
        if let Some(language) = config.language {
            if let Err(e) = gte_syntax::check_syntax(candidate, language) {
                return CheckOutcome::fail(e.to_string(), started.elapsed());
            }
        }

        match config.commands.syntax.as_deref() {
            Some(template) => {
                let parent = sandbox_file.parent().unwrap_or_else(|| Path::new("."));
                let mut outcome = run_template(template, sandbox_file, &[], parent, runner).await;
                outcome.duration = started.elapsed();
                outcome
            }
            None => CheckOutcome::pass("", started.elapsed()),
        }
    }
}

async fn run_template(
    template: &str,
    file: &Path,
    scope: &[String],
    cwd: &Path,
    runner: &CommandRunner,
) -> CheckOutcome {
    match render(template, file, scope) {
        Ok(argv) => {
            let out = runner.run(&argv, cwd).await;
            CheckOutcome {
                passed: out.success,
                output: out.output,
                duration: out.duration,
            }
        }
        Err(e) => CheckOutcome::fail(e.to_string(), Duration::ZERO),
    }
}
