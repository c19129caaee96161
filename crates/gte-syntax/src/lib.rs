//! GTE Syntax
//!
//! Language detection and tree-sitter structure queries shared by the patch
//! engine (anchor resolution, pre-write checks) and the sandbox validator
//! (syntax tier).
//!
//! # Example
//!
//! ```rust
//! use gte_syntax::{check_syntax, Language};
//!
//! assert!(check_syntax("def ok():\n    return 1\n", Language::Python).is_ok());
//! assert!(check_syntax("def bad(:\n", Language::Python).is_err());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod language;
pub mod parse;

pub use error::SyntaxError;
pub use language::Language;
pub use parse::{
    check_path_syntax, check_syntax, contains_comment, declarations, parse,
    standalone_declaration, Declaration, StandaloneDeclaration,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
