//! GTE Sandbox
//!
//! Validates a candidate file in a disposable directory before it is
//! accepted. Tiers run in a fixed order and fail fast on syntax:
//!
//! ```text
//! syntax ──fail──► return
//!   │
//!   ▼
//! lint? ─► tests? ─► type_check?      passed = every tier that ran passed
//! ```
//!
//! External checks run through [`CommandRunner`] with a timeout; a missing
//! binary or a timeout fails the tier instead of erroring.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod command;
pub mod config;
pub mod error;
pub mod related;
pub mod result;
pub mod templates;
pub mod validator;

pub use command::{render, tokenize, CommandOutput, CommandRunner};
pub use config::{ValidationConfig, ValidationOptions, ValidationSettings, DEFAULT_TIMEOUT_SECS};
pub use error::SandboxError;
pub use related::resolve_related_tests;
pub use result::{CheckOutcome, Tier, ValidationResult};
pub use templates::{CommandTemplates, LanguageCommands};
pub use validator::SandboxValidator;
