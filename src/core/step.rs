//! Step domain model

use crate::core::config::{BuildMode, StepConfig};
use crate::core::error::{BuildError, BuildResult, StepError};
use crate::core::resource::Artifact;
use crate::handlers::{HandlerCatalog, OptionSpec, StepHandler, StepInput, StepOptions, COMMON_OPTIONS};
use std::sync::Arc;
use std::time::Duration;

/// A registered step: a handler plus its validated configuration
#[derive(Clone)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Handler the step delegates to
    handler: Arc<dyn StepHandler>,

    /// Handler options
    pub options: StepOptions,

    /// A failure aborts the whole run instead of just this resource
    pub fatal: bool,

    /// Modes the step is enabled in (empty = all)
    pub modes: Vec<BuildMode>,

    /// Steps that must run earlier in the same chain
    pub requires: Vec<String>,

    /// Per-invocation time limit
    pub timeout: Option<Duration>,

    pub description: Option<String>,
}

impl Step {
    /// A step with default settings
    pub fn new(name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            options: StepOptions::default(),
            fatal: false,
            modes: Vec::new(),
            requires: Vec::new(),
            timeout: None,
            description: None,
        }
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn with_modes(mut self, modes: Vec<BuildMode>) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_requires(mut self, requires: Vec<String>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create a step from a step config, looking the handler up in the catalog
    pub fn from_config(config: &StepConfig, catalog: &HandlerCatalog) -> BuildResult<Self> {
        let handler = catalog.get(config.handler_name()).ok_or_else(|| {
            BuildError::Configuration(format!(
                "Step '{}' uses unknown handler '{}' (available: {})",
                config.name,
                config.handler_name(),
                catalog.names().join(", ")
            ))
        })?;

        let mut step = Step::new(config.name.clone(), handler)
            .with_options(StepOptions::new(config.options.clone()))
            .with_fatal(config.fatal)
            .with_modes(config.modes.clone())
            .with_requires(config.requires.clone());
        step.timeout = config.timeout_secs.map(Duration::from_secs);
        step.description = config.description.clone();

        Ok(step)
    }

    /// Name of the handler implementing this step
    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// Check if the step is enabled in the given mode
    pub fn enabled_in(&self, mode: BuildMode) -> bool {
        self.modes.is_empty() || self.modes.contains(&mode)
    }

    /// Look up a recognized option by name
    pub fn option_spec(&self, key: &str) -> Option<&OptionSpec> {
        COMMON_OPTIONS
            .iter()
            .chain(self.handler.options().iter())
            .find(|spec| spec.name == key)
    }

    /// Every option this step recognizes
    pub fn recognized_options(&self) -> Vec<&'static str> {
        COMMON_OPTIONS
            .iter()
            .chain(self.handler.options().iter())
            .map(|spec| spec.name)
            .collect()
    }

    /// Run the handler and apply the common `filename` option
    pub async fn execute(&self, input: StepInput<'_>) -> Result<Artifact, StepError> {
        let run = self.handler.execute(input, &self.options);

        let mut artifact = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                StepError::Failed(format!("Timeout after {} seconds", limit.as_secs()))
            })??,
            None => run.await?,
        };

        if let Some(template) = self.options.get_str("filename") {
            artifact.filename_template = Some(template.to_string());
        }

        Ok(artifact)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .field("fatal", &self.fatal)
            .field("modes", &self.modes)
            .field("requires", &self.requires)
            .finish()
    }
}
