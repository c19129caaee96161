//! GTE Patch
//!
//! Turns model output into file edits:
//!
//! - [`extract_code_block`] pulls the proposed code out of a response
//! - [`PatchEngine`] places it in the target file, structurally when a
//!   declaration anchor can be resolved, textually otherwise
//! - every write is preceded by a syntax check and a backup that
//!   [`PatchEngine::restore`] puts back
//!
//! # Example
//!
//! ```rust,no_run
//! use gte_patch::{PatchContext, PatchEngine};
//! use std::path::Path;
//!
//! let engine = PatchEngine::default();
//! let ctx = PatchContext::symbol("add");
//! let result = engine.apply(Path::new("calc.py"), "def add(a, b):\n    return b + a\n", Some(&ctx));
//! if !result.success {
//!     engine.restore(Path::new("calc.py")).ok();
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backup;
pub mod engine;
pub mod error;
pub mod extract;
mod structural;
pub mod text;
mod textual;

pub use backup::{backup_path_for, Backup, BackupStore, BACKUP_SUFFIX};
pub use engine::{
    unified_diff, AppliedPatch, PatchConfig, PatchContext, PatchEngine, PatchResult,
    PatchStrategy, DEFAULT_SYMBOL_THRESHOLD, DEFAULT_TEXT_THRESHOLD,
};
pub use error::PatchError;
pub use extract::extract_code_block;
pub use text::similarity;
