//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, PlanCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Rule-driven asset build pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "assetline")]
#[command(author = "Assetline Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Build front-end assets from declarative rules and steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the build configuration file
    #[arg(short, long, global = true, default_value = "assetline.yaml")]
    pub config: PathBuf,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a build
    Build(BuildCommand),

    /// Validate the build configuration
    Validate(ValidateCommand),

    /// Print the execution plan without running it
    Plan(PlanCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
