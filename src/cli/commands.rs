//! CLI command definitions

use crate::core::config::BuildMode;
use crate::execution::SchedulingStrategy;
use clap::Args;

/// Worker count for `parallel-limited` when the configuration sets none
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Run a build
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    /// Build mode (defaults to the configuration's `mode`)
    #[arg(short, long, value_enum)]
    pub mode: Option<BuildModeArg>,

    /// Keep running and rebuild when source files change
    #[arg(short, long)]
    pub watch: bool,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Print the build report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate the build configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the execution plan
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Build mode (defaults to the configuration's `mode`)
    #[arg(short, long, value_enum)]
    pub mode: Option<BuildModeArg>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Build mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BuildModeArg {
    Development,
    Production,
}

impl From<BuildModeArg> for BuildMode {
    fn from(arg: BuildModeArg) -> Self {
        match arg {
            BuildModeArg::Development => BuildMode::Development,
            BuildModeArg::Production => BuildMode::Production,
        }
    }
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    /// Resolve against the configured worker count
    pub fn into_strategy(self, concurrency: Option<usize>) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(concurrency.unwrap_or(DEFAULT_CONCURRENCY))
            }
        }
    }
}
