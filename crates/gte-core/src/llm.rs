//! Code generation collaborator
//!
//! Tasks that arrive without proposed code can ask a [`CodeGenerator`] for
//! one. The engine stays vendor-neutral: it only builds the prompt and pulls
//! the fenced code block out of whatever comes back.

use crate::types::FixTask;

/// Lines of source shown around the issue line
pub const CONTEXT_LINES: usize = 20;

/// Failure reported by a code generator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The request timed out
    #[error("generation timeout: {0}")]
    Timeout(String),

    /// The service could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// The service refused the request
    #[error("generation rejected: {0}")]
    Rejected(String),

    /// Anything else
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerateError {
    /// Whether asking again may help
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// Produces replacement code from a prompt
#[cfg_attr(test, mockall::automock)]
pub trait CodeGenerator: Send + Sync {
    /// Answer `prompt`; the answer should contain one fenced code block
    ///
    /// # Errors
    /// Returns [`GenerateError`] when no answer could be produced.
    fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Up to `max_lines` lines of `source` centred on 1-based `line`
#[must_use]
pub fn code_context(source: &str, line: u32, max_lines: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line = usize::try_from(line).unwrap_or(usize::MAX).max(1);
    let start = line.saturating_sub(1 + max_lines / 2);
    let end = lines.len().min(start.saturating_add(max_lines));
    if start >= end {
        return String::new();
    }
    let mut out = lines[start..end].join("\n");
    out.push('\n');
    out
}

/// Prompt asking for a fix of `task`
///
/// `source` is the current file content, used for the surrounding code.
/// `last_error` is fed back when a previous attempt failed.
#[must_use]
pub fn build_fix_prompt(task: &FixTask, source: Option<&str>, last_error: Option<&str>) -> String {
    let issue = &task.issue;
    let language = issue.language().map_or("text", |l| l.name());
    let mut prompt = format!("Fix the `{}` issue in `{}`.\n", issue.rule_id, issue.location());

    if !issue.description.is_empty() {
        prompt.push_str(&format!("Issue: {}\n", issue.description));
    }
    if let Some(symbol) = task.patch.context.as_ref().and_then(|c| c.target_symbol.as_deref()) {
        prompt.push_str(&format!("Function or type to change: `{symbol}`\n"));
    }
    if let Some(hint) = &task.patch.llm_hint {
        prompt.push_str(&format!("Hint: {hint}\n"));
    }

    if let (Some(source), Some(line)) = (source, issue.line) {
        let context = code_context(source, line, CONTEXT_LINES);
        if !context.is_empty() {
            prompt.push_str(&format!("\nCurrent code:\n```{language}\n{context}```\n"));
        }
    }

    if let Some(error) = last_error {
        prompt.push_str(&format!("\nThe previous attempt failed with:\n{error}\n"));
    }

    prompt.push_str(&format!(
        "\nReply with the complete replacement declaration in a single ```{language} code block. \
         Do not change unrelated code, tests or build configuration.\n"
    ));
    prompt
}
