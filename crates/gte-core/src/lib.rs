//! GTE Core - Governance Task Execution
//!
//! Runs a set of fix tasks against a source tree:
//! - Orders them by dependency and priority into batches
//! - Applies each proposed fix structurally, falling back to fuzzy text matching
//! - Validates the result in a sandbox and rolls back on failure
//! - Optionally isolates every task on its own git branch
//! - Classifies failures, retries transient ones with backoff, and skips
//!   the dependents of tasks that failed
//!
//! # Example
//!
//! ```rust,ignore
//! use gte_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_path("gte.toml".as_ref())?;
//! let pipeline = PatchPipeline::from_config(&config)?;
//! let mut orchestrator = Orchestrator::new(Arc::new(pipeline), config.orchestrator.clone());
//!
//! let issue = Issue::new("app.py", "E501").at_line(12);
//! orchestrator.add_task(FixTask::new("app.py:E501:12", issue, PatchSpec::code("x = 1\n")))?;
//!
//! let report = orchestrator.execute().await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod review;
pub mod selection;
pub mod types;

pub use analyzer::{FailureAnalyzer, FailureReason};
pub use config::{EngineConfig, IsolationConfig, OrchestratorConfig, DEFAULT_MAX_PARALLEL};
pub use error::{ConfigError, EngineError, TaskError};
pub use executor::{AttemptOutcome, FixExecutor};
pub use llm::{build_fix_prompt, code_context, CodeGenerator, GenerateError};
pub use orchestrator::Orchestrator;
pub use pipeline::PatchPipeline;
pub use retry::RetryPolicy;
pub use review::ManualReviewTicket;
pub use selection::TaskSelector;
pub use types::{
    FixTask, Issue, PatchSpec, RiskLevel, RunReport, TaskFile, TaskOutcome, DEFAULT_MAX_RETRIES,
};

pub use gte_kernel::{ExecutionPlan, TaskId, TaskStatus};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a run
    pub use crate::{
        EngineConfig, EngineError, FixExecutor, FixTask, Issue, Orchestrator, OrchestratorConfig,
        PatchPipeline, PatchSpec, RetryPolicy, RunReport, TaskId, TaskSelector, TaskStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
