//! Execution plan: the ordered step chain for every resource

use crate::core::config::BuildSettings;
use crate::core::error::{BuildError, BuildResult};
use crate::core::registry::StepRegistry;
use crate::core::resource::Resource;
use crate::core::rule::RuleMatcher;
use crate::core::step::Step;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// When a chain runs relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Per-resource transforms, run concurrently
    Transform,
    /// Global plugins, run after every transform chain has emitted
    Emit,
}

/// The ordered steps to apply to one resource
#[derive(Debug, Clone)]
pub struct Chain {
    pub resource: Resource,
    pub steps: Vec<Arc<Step>>,
    pub phase: Phase,
}

impl Chain {
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A global plugin: one step run once against its own input
#[derive(Debug, Clone)]
pub struct Plugin {
    pub step: Arc<Step>,
    pub resource: Resource,
}

/// Ordered (resource, step) pairs, grouped into chains
#[derive(Debug, Clone, Default)]
pub struct Plan {
    chains: Vec<Chain>,
}

impl Plan {
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn transform_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter().filter(|c| c.phase == Phase::Transform)
    }

    pub fn emit_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter().filter(|c| c.phase == Phase::Emit)
    }

    /// Flattened (resource path, step name) pairs in plan order
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.chains
            .iter()
            .flat_map(|chain| {
                chain
                    .steps
                    .iter()
                    .map(move |step| (chain.resource.path.as_str(), step.name.as_str()))
            })
            .collect()
    }

    /// Step names planned for a resource path
    pub fn steps_for(&self, path: &str) -> Option<Vec<&str>> {
        self.chains
            .iter()
            .find(|c| c.resource.path == path)
            .map(Chain::step_names)
    }

    /// Number of (resource, step) pairs
    pub fn len(&self) -> usize {
        self.chains.iter().map(|c| c.steps.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Turns resources and rules into a [`Plan`]
pub struct PlanBuilder<'a> {
    registry: &'a StepRegistry,
    matcher: &'a RuleMatcher,
    settings: BuildSettings,
    plugins: &'a [Plugin],
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a StepRegistry, matcher: &'a RuleMatcher, settings: BuildSettings) -> Self {
        Self {
            registry,
            matcher,
            settings,
            plugins: &[],
        }
    }

    pub fn with_plugins(mut self, plugins: &'a [Plugin]) -> Self {
        self.plugins = plugins;
        self
    }

    /// Build the plan; resources with no matching step are left out
    pub fn build(&self, resources: &[Resource]) -> BuildResult<Plan> {
        let mut chains = Vec::new();

        for resource in resources {
            let steps = self.chain_for(&resource.path)?;
            if steps.is_empty() {
                continue;
            }
            chains.push(Chain {
                resource: resource.clone(),
                steps,
                phase: Phase::Transform,
            });
        }

        for plugin in self.plugins {
            if !self.enabled(&plugin.step) {
                debug!(plugin = %plugin.step.name, "Plugin disabled in this mode");
                continue;
            }
            chains.push(Chain {
                resource: plugin.resource.clone(),
                steps: vec![plugin.step.clone()],
                phase: Phase::Emit,
            });
        }

        Ok(Plan { chains })
    }

    fn chain_for(&self, path: &str) -> BuildResult<Vec<Arc<Step>>> {
        let mut seen = HashSet::new();
        let mut steps = Vec::new();

        for rule in self.matcher.matching(path) {
            for name in &rule.steps {
                if !seen.insert(name.as_str()) {
                    debug!(resource = path, step = %name, "Step already planned, collapsing");
                    continue;
                }
                let step = self.registry.resolve(name)?;
                if self.enabled(step) {
                    steps.push(step.clone());
                }
            }
        }

        order_by_prerequisites(steps)
    }

    fn enabled(&self, step: &Step) -> bool {
        if !step.enabled_in(self.settings.mode) {
            return false;
        }
        if step.handler_name() == "minify" && !self.settings.minimize {
            return false;
        }
        true
    }
}

/// Stable topological order: a step moves after the prerequisites present
/// in the same chain, otherwise declaration order is kept
fn order_by_prerequisites(steps: Vec<Arc<Step>>) -> BuildResult<Vec<Arc<Step>>> {
    if steps.iter().all(|s| s.requires.is_empty()) {
        return Ok(steps);
    }

    let mut pending = steps;
    let mut ordered: Vec<Arc<Step>> = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|step| {
            step.requires
                .iter()
                .all(|req| !pending.iter().any(|p| &p.name == req))
        });

        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                let mut cycle: Vec<String> = pending.iter().map(|s| s.name.clone()).collect();
                cycle.push(pending[0].name.clone());
                return Err(BuildError::CyclicDependency { cycle });
            }
        }
    }

    Ok(ordered)
}
