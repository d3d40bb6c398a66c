//! Core domain models
//!
//! Configuration, steps and their registry, rules, and the execution plan
//! built from them.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod resource;
pub mod rule;
pub mod state;
pub mod step;
pub mod template;

pub use config::{BuildConfig, BuildMode, BuildSettings};
pub use error::{BuildError, BuildResult, StepError};
pub use pipeline::Pipeline;
pub use plan::{Chain, Phase, Plan, PlanBuilder, Plugin};
pub use registry::StepRegistry;
pub use resource::{Artifact, EmittedAsset, Resource};
pub use rule::{Rule, RuleMatcher, RulePattern};
pub use state::*;
pub use step::Step;
