//! Bounded subprocess execution
//!
//! Templates are split into argv once, then placeholders are substituted
//! per token. Nothing goes through a shell, so substituted paths with spaces
//! or metacharacters stay a single argument.

use crate::error::SandboxError;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Placeholder for the sandboxed file
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Placeholder for the test scope
pub const SCOPE_PLACEHOLDER: &str = "{scope}";

/// Characters of combined output kept per check
const MAX_OUTPUT_CHARS: usize = 4000;

/// Split a command template into argv, honouring single and double quotes
///
/// # Errors
/// Returns error if the template is empty or a quote is unterminated
pub fn tokenize(template: &str) -> Result<Vec<String>, SandboxError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_token = true;
                }
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(SandboxError::UnbalancedQuote(template.to_string()));
    }
    if in_token {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(SandboxError::EmptyCommand);
    }
    Ok(tokens)
}

/// Tokenize a template and substitute placeholders
///
/// A token that is exactly `{scope}` expands to one argument per scope
/// entry, or to nothing when the scope is empty; elsewhere the scope
/// entries are joined with spaces.
///
/// # Errors
/// Returns error if the template cannot be tokenized
pub fn render(template: &str, file: &Path, scope: &[String]) -> Result<Vec<String>, SandboxError> {
    let file = file.to_string_lossy();
    let mut argv = Vec::new();
    for token in tokenize(template)? {
        if token == SCOPE_PLACEHOLDER {
            argv.extend(scope.iter().cloned());
            continue;
        }
        let joined_scope = scope.join(" ");
        argv.push(
            token
                .replace(FILE_PLACEHOLDER, &file)
                .replace(SCOPE_PLACEHOLDER, &joined_scope),
        );
    }
    Ok(argv)
}

/// Captured result of one subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exited with status zero
    pub success: bool,
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, truncated
    pub output: String,
    /// Killed after exceeding the timeout
    pub timed_out: bool,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl CommandOutput {
    fn failure(message: String, duration: Duration, timed_out: bool) -> Self {
        Self {
            success: false,
            exit_code: None,
            output: message,
            timed_out,
            duration,
        }
    }
}

/// Runs argv vectors with a per-invocation timeout
#[derive(Debug, Clone, Copy)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    /// Create runner
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `argv` in `cwd`
    ///
    /// Never fails: a missing binary, spawn error or timeout is reported as
    /// an unsuccessful [`CommandOutput`]. A timed-out child is killed.
    pub async fn run(&self, argv: &[String], cwd: &Path) -> CommandOutput {
        let started = Instant::now();
        let Some((program, args)) = argv.split_first() else {
            return CommandOutput::failure("empty command".into(), started.elapsed(), false);
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(program = %program, ?args, cwd = %cwd.display(), "running check command");

        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                tracing::warn!(program = %program, timeout = ?self.timeout, "check command timed out");
                CommandOutput::failure(
                    format!("`{program}` timed out after {}s", self.timeout.as_secs_f32()),
                    started.elapsed(),
                    true,
                )
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(program = %program, "check command not found");
                CommandOutput::failure(format!("command not found: {program}"), started.elapsed(), false)
            }
            Ok(Err(e)) => CommandOutput::failure(
                format!("failed to run `{program}`: {e}"),
                started.elapsed(),
                false,
            ),
            Ok(Ok(out)) => {
                let mut combined = String::new();
                if !out.stdout.is_empty() {
                    combined.push_str(&String::from_utf8_lossy(&out.stdout));
                }
                if !out.stderr.is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(&String::from_utf8_lossy(&out.stderr));
                }
                CommandOutput {
                    success: out.status.success(),
                    exit_code: out.status.code(),
                    output: truncate_output(&combined, MAX_OUTPUT_CHARS),
                    timed_out: false,
                    duration: started.elapsed(),
                }
            }
        }
    }
}

/// Trim and cap output at `max` characters
#[must_use]
pub fn truncate_output(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let snippet: String = trimmed.chars().take(max).collect();
        format!("{snippet}\n… (truncated)")
    }
}
