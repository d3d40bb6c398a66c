//! Step registry: named steps, option validation and prerequisite checks

use crate::core::config::BuildConfig;
use crate::core::error::{BuildError, BuildResult};
use crate::core::step::Step;
use crate::handlers::HandlerCatalog;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// All steps known to a build, keyed by name
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Arc<Step>>,
    index: HashMap<String, usize>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every step of a configuration and check their prerequisites
    pub fn from_config(config: &BuildConfig, catalog: &HandlerCatalog) -> BuildResult<Self> {
        let mut registry = Self::new();
        for step_config in &config.steps {
            registry.register(Step::from_config(step_config, catalog)?)?;
        }
        registry.check_prerequisites()?;
        Ok(registry)
    }

    /// Add a step, validating its options against its handler
    pub fn register(&mut self, step: Step) -> BuildResult<()> {
        if self.index.contains_key(&step.name) {
            return Err(BuildError::DuplicateStep { name: step.name });
        }

        validate_options(&step, step.options.as_map())?;

        debug!(step = %step.name, handler = step.handler_name(), "Registered step");
        self.index.insert(step.name.clone(), self.steps.len());
        self.steps.push(Arc::new(step));
        Ok(())
    }

    /// Look a step up by name
    pub fn resolve(&self, name: &str) -> BuildResult<&Arc<Step>> {
        self.index
            .get(name)
            .map(|&i| &self.steps[i])
            .ok_or_else(|| BuildError::UnknownStep {
                name: name.to_string(),
            })
    }

    /// Check an option map against the recognized options of a registered step
    pub fn validate_config(&self, step: &str, options: &Map<String, Value>) -> BuildResult<()> {
        validate_options(self.resolve(step)?, options)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Steps in registration order
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every `requires` entry must name a registered step, and the
    /// prerequisite graph must be acyclic
    pub fn check_prerequisites(&self) -> BuildResult<()> {
        for step in &self.steps {
            for required in &step.requires {
                if !self.contains(required) {
                    return Err(BuildError::Configuration(format!(
                        "Step '{}' requires unknown step '{}'",
                        step.name, required
                    )));
                }
            }
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for step in &self.steps {
            self.visit(&step.name, &mut visited, &mut path)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> BuildResult<()> {
        if let Some(start) = path.iter().position(|&n| n == name) {
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Err(BuildError::CyclicDependency { cycle });
        }
        if visited.contains(name) {
            return Ok(());
        }

        path.push(name);
        if let Ok(step) = self.resolve(name) {
            for required in &step.requires {
                self.visit(required, visited, path)?;
            }
        }
        path.pop();
        visited.insert(name);
        Ok(())
    }
}

fn validate_options(step: &Step, options: &Map<String, Value>) -> BuildResult<()> {
    for (key, value) in options {
        let spec = step.option_spec(key).ok_or_else(|| BuildError::InvalidOption {
            step: step.name.clone(),
            key: key.clone(),
            reason: format!(
                "not recognized by handler '{}' (expected one of: {})",
                step.handler_name(),
                step.recognized_options().join(", ")
            ),
        })?;

        spec.kind.check(value).map_err(|reason| BuildError::InvalidOption {
            step: step.name.clone(),
            key: key.clone(),
            reason,
        })?;
    }
    Ok(())
}
