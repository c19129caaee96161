//! Patch application engine
//!
//! Cascade per call:
//!
//! ```text
//! parse target ─► resolve anchor ─► structural splice ─┐
//!      │ (unsupported / invalid)   (no anchor / fail)  │
//!      └──────────────────────────► textual fuzzy ─────┤
//!                                                      ▼
//!                               syntax check ─► backup ─► write
//! ```

use crate::backup::BackupStore;
use crate::error::PatchError;
use crate::text::normalize_fragment;
use crate::{structural, textual};
use gte_syntax::{check_syntax, Language};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::path::{Path, PathBuf};

/// Default similarity needed to pick an anchor from a reference snippet
pub const DEFAULT_SYMBOL_THRESHOLD: f64 = 0.75;

/// Default similarity needed for a textual replacement
pub const DEFAULT_TEXT_THRESHOLD: f64 = 0.6;

/// Similarity thresholds; both are exclusive lower bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Snippet-to-declaration similarity for anchor resolution
    pub symbol_threshold: f64,
    /// Block-to-proposal similarity for textual substitution
    pub text_threshold: f64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            symbol_threshold: DEFAULT_SYMBOL_THRESHOLD,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }
}

/// Hints locating where a patch belongs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchContext {
    /// Name of the declaration being replaced
    pub target_symbol: Option<String>,
    /// Original source of the declaration, for similarity matching
    pub reference_snippet: Option<String>,
}

impl PatchContext {
    /// Context naming a target symbol
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self {
            target_symbol: Some(name.into()),
            reference_snippet: None,
        }
    }

    /// Attach a reference snippet
    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.reference_snippet = Some(snippet.into());
        self
    }
}

/// Strategy that produced the new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStrategy {
    /// Declaration spliced via the syntax tree
    Structural,
    /// Block replaced via line similarity
    Textual,
}

impl PatchStrategy {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStrategy::Structural => "structural",
            PatchStrategy::Textual => "textual",
        }
    }
}

impl std::fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patch that has been written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPatch {
    /// File written
    pub path: PathBuf,
    /// Strategy used
    pub strategy: PatchStrategy,
    /// Content before the write
    pub original: String,
    /// Content written
    pub content: String,
}

impl AppliedPatch {
    /// Unified diff of this patch
    #[must_use]
    pub fn diff(&self) -> String {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "file".into(), |n| n.to_string_lossy());
        unified_diff(&self.original, &self.content, &name)
    }
}

/// Outcome of [`PatchEngine::apply`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchResult {
    /// Whether new content was written
    pub success: bool,
    /// New file content on success
    pub content: Option<String>,
    /// Error text on failure
    pub error: Option<String>,
    /// Strategy used on success
    pub strategy: Option<PatchStrategy>,
    /// Commit holding the change, when isolation is enabled
    pub commit_ref: Option<String>,
}

impl PatchResult {
    /// Attach the commit that recorded this patch
    #[must_use]
    pub fn with_commit(mut self, commit_ref: impl Into<String>) -> Self {
        self.commit_ref = Some(commit_ref.into());
        self
    }
}

impl From<Result<AppliedPatch, PatchError>> for PatchResult {
    fn from(result: Result<AppliedPatch, PatchError>) -> Self {
        match result {
            Ok(applied) => Self {
                success: true,
                content: Some(applied.content),
                error: None,
                strategy: Some(applied.strategy),
                commit_ref: None,
            },
            Err(err) => Self {
                success: false,
                error: Some(err.to_string()),
                ..Self::default()
            },
        }
    }
}

/// Applies proposed code to files, keeping a backup of each original
///
/// Safe to share between tasks; callers must not patch one file from two
/// tasks at once.
#[derive(Debug, Default)]
pub struct PatchEngine {
    config: PatchConfig,
    backups: BackupStore,
}

impl PatchEngine {
    /// Create engine with thresholds
    #[must_use]
    pub fn new(config: PatchConfig) -> Self {
        Self {
            config,
            backups: BackupStore::new(),
        }
    }

    /// Get thresholds
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Apply a patch, reporting failure in the result
    pub fn apply(
        &self,
        path: &Path,
        proposed_code: &str,
        context: Option<&PatchContext>,
    ) -> PatchResult {
        self.try_apply(path, proposed_code, context).into()
    }

    /// Apply a patch
    ///
    /// # Errors
    /// - [`PatchError::EmptyPatch`] for blank proposals
    /// - [`PatchError::AnchorNotFound`] / [`PatchError::NoMatchingRegion`] if
    ///   neither strategy can place the code
    /// - [`PatchError::Syntax`] if the result does not parse (nothing written)
    /// - [`PatchError::Io`] on read or write failure
    pub fn try_apply(
        &self,
        path: &Path,
        proposed_code: &str,
        context: Option<&PatchContext>,
    ) -> Result<AppliedPatch, PatchError> {
        let proposed = normalize_fragment(proposed_code);
        if proposed.is_empty() {
            return Err(PatchError::EmptyPatch);
        }

        let original = std::fs::read_to_string(path).map_err(|e| PatchError::io_error(path, e))?;
        let default_context = PatchContext::default();
        let context = context.unwrap_or(&default_context);
        let language = Language::from_path(path);

        let structural = language.map(|lang| {
            structural::substitute(&original, &proposed, context, lang, self.config.symbol_threshold)
        });
        let (content, strategy) = match structural {
            Some(Ok((content, anchor))) => {
                tracing::debug!(file = %path.display(), anchor = %anchor, "structural substitution");
                (content, PatchStrategy::Structural)
            }
            skipped => {
                let anchor_missing = matches!(skipped, Some(Err(structural::Skip::NoAnchor)));
                if let Some(Err(reason)) = skipped {
                    tracing::debug!(file = %path.display(), reason = reason.as_str(), "structural stage skipped");
                }
                let markers: Vec<&str> =
                    language.map_or_else(|| vec!["#", "//"], |lang| vec![lang.line_comment_marker()]);
                match textual::substitute(&original, &proposed, &markers, self.config.text_threshold) {
                    Ok((content, region)) => {
                        tracing::debug!(
                            file = %path.display(),
                            start_line = region.start + 1,
                            score = region.score,
                            "textual substitution"
                        );
                        (content, PatchStrategy::Textual)
                    }
                    Err(best_score) => {
                        tracing::info!(file = %path.display(), best_score, "no region matched the patch");
                        return Err(match context.target_symbol.clone() {
                            Some(symbol) if anchor_missing => PatchError::AnchorNotFound { symbol },
                            _ => PatchError::NoMatchingRegion { best_score },
                        });
                    }
                }
            }
        };

        if let Some(lang) = language {
            check_syntax(&content, lang).map_err(|source| PatchError::Syntax {
                path: path.to_path_buf(),
                source,
            })?;
        }

        self.backups.create(path)?;
        std::fs::write(path, &content).map_err(|e| PatchError::io_error(path, e))?;
        tracing::info!(file = %path.display(), strategy = %strategy, "patch applied");

        Ok(AppliedPatch {
            path: path.to_path_buf(),
            strategy,
            original,
            content,
        })
    }

    /// Move the backup back over `path`
    ///
    /// # Errors
    /// Returns [`PatchError::NoBackup`] if no backup exists
    pub fn restore(&self, path: &Path) -> Result<(), PatchError> {
        self.backups.restore(path)
    }

    /// Discard the backup of `path`; `false` if there was none
    ///
    /// # Errors
    /// Returns error if the backup file cannot be removed
    pub fn cleanup(&self, path: &Path) -> Result<bool, PatchError> {
        self.backups.discard(path)
    }

    /// Whether `path` has a pending backup
    #[inline]
    #[must_use]
    pub fn has_backup(&self, path: &Path) -> bool {
        self.backups.contains(path)
    }

    /// Unified diff between two versions of `filename`
    #[must_use]
    pub fn diff(original: &str, new: &str, filename: &str) -> String {
        unified_diff(original, new, filename)
    }
}

/// Unified diff with `a/` and `b/` headers and three lines of context
#[must_use]
pub fn unified_diff(original: &str, new: &str, filename: &str) -> String {
    TextDiff::from_lines(original, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{filename}"), &format!("b/{filename}"))
        .to_string()
}
