//! assetline - A rule-driven asset build pipeline

pub mod cli;
pub mod core;
pub mod execution;
pub mod handlers;

// Re-export commonly used types
pub use core::{BuildConfig, BuildError, BuildMode, BuildReport, ExecutionStatus, Pipeline, Plan, Step, StepRegistry};
pub use execution::{BuildEngine, CancellationFlag, ExecutionEvent, SchedulingStrategy};
pub use handlers::{HandlerCatalog, StepHandler};
