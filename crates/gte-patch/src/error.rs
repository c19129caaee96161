//! Error types for patch application

use gte_syntax::SyntaxError;
use std::path::PathBuf;

/// Errors raised while applying or undoing a patch
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Proposed code is empty or whitespace only
    #[error("proposed patch is empty")]
    EmptyPatch,

    /// A target symbol was named but neither strategy could place the patch
    #[error("no matching region: symbol `{symbol}` not found")]
    AnchorNotFound {
        /// Symbol named by the patch context
        symbol: String,
    },

    /// Textual fallback found no candidate above the threshold
    #[error("no matching region (best similarity {best_score:.2})")]
    NoMatchingRegion {
        /// Highest similarity seen, 0.0 if there were no candidates
        best_score: f64,
    },

    /// Patched content does not parse; nothing was written
    #[error("syntax error in patched {path}: {source}")]
    Syntax {
        /// File being patched
        path: PathBuf,
        /// Parser diagnosis
        #[source]
        source: SyntaxError,
    },

    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Restore requested but no backup exists
    #[error("no backup found for {0}")]
    NoBackup(PathBuf),
}

impl PatchError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the patch itself could not be placed in the file
    ///
    /// These failures need a regenerated patch rather than a retry.
    #[inline]
    #[must_use]
    pub fn is_contextual(&self) -> bool {
        matches!(
            self,
            Self::EmptyPatch | Self::AnchorNotFound { .. } | Self::NoMatchingRegion { .. }
        )
    }
}
