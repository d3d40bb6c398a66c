//! Pipeline domain model: a configuration resolved for one build mode

use crate::core::config::{BuildConfig, BuildMode, BuildSettings, NotificationConfig, OutputConfig};
use crate::core::error::{BuildError, BuildResult};
use crate::core::plan::{Plan, PlanBuilder, Plugin};
use crate::core::registry::StepRegistry;
use crate::core::resource::{discover_resources, Resource};
use crate::core::rule::RuleMatcher;
use crate::handlers::HandlerCatalog;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A validated, immutable build definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Project name
    pub name: String,

    /// Mode-resolved switches
    pub settings: BuildSettings,

    /// Resolved source directory
    pub source_dir: PathBuf,

    /// Resolved output directory
    pub output_dir: PathBuf,

    pub output: OutputConfig,

    pub notifications: NotificationConfig,

    /// Worker count for limited parallel scheduling
    pub concurrency: Option<usize>,

    /// Watch mode poll interval
    pub poll_interval: Duration,

    registry: Arc<StepRegistry>,
    matcher: Arc<RuleMatcher>,
    plugins: Vec<Plugin>,
}

impl Pipeline {
    /// Resolve a configuration: register steps, compile rules, bind plugins.
    ///
    /// Every wiring error surfaces here, before any resource is touched.
    pub fn from_config(config: &BuildConfig, mode: BuildMode, catalog: &HandlerCatalog) -> BuildResult<Self> {
        let registry = StepRegistry::from_config(config, catalog)?;
        let matcher = RuleMatcher::from_config(&config.rules, &registry)?;

        let plugins = config
            .plugins
            .iter()
            .map(|name| {
                let step = registry.resolve(name)?.clone();
                let resource = match step.options.get_str("template") {
                    Some(template) => Resource::from_file(template, config.base_dir.join(template)),
                    None => Resource::inline(name.clone(), Vec::new()),
                };
                Ok(Plugin { step, resource })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        let source_dir = config.source_path();
        let output_dir = config.output_path();
        check_output_dir(&source_dir, &output_dir)?;

        let settings = config.settings(mode);
        info!(
            name = %config.name,
            mode = %mode,
            steps = registry.len(),
            rules = matcher.rules().len(),
            plugins = plugins.len(),
            "Resolved pipeline"
        );

        Ok(Pipeline {
            name: config.name.clone(),
            settings,
            source_dir,
            output_dir,
            output: config.output.clone(),
            notifications: config.notifications.clone(),
            concurrency: config.concurrency,
            poll_interval: Duration::from_millis(config.watch.poll_interval_ms),
            registry: Arc::new(registry),
            matcher: Arc::new(matcher),
            plugins,
        })
    }

    pub fn mode(&self) -> BuildMode {
        self.settings.mode
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Scan the source directory, skipping the output directory
    pub fn discover(&self) -> BuildResult<Vec<Resource>> {
        discover_resources(&self.source_dir, std::slice::from_ref(&self.output_dir)).map_err(|e| {
            BuildError::Configuration(format!(
                "Failed to read source directory {}: {}",
                self.source_dir.display(),
                e
            ))
        })
    }

    /// Plan the given resources
    pub fn plan(&self, resources: &[Resource]) -> BuildResult<Plan> {
        PlanBuilder::new(&self.registry, &self.matcher, self.settings)
            .with_plugins(&self.plugins)
            .build(resources)
    }
}

/// The output directory is cleaned and written; it may sit inside the
/// source tree but never be the source directory or one of its ancestors.
fn check_output_dir(source: &Path, output: &Path) -> BuildResult<()> {
    let source_abs = normalize(source)?;
    let output_abs = normalize(output)?;
    if source_abs.starts_with(&output_abs) {
        return Err(BuildError::Configuration(format!(
            "Output directory {} must not be or contain the source directory {}",
            output.display(),
            source.display()
        )));
    }
    Ok(())
}

/// Absolute path with `.` and `..` resolved lexically
fn normalize(path: &Path) -> BuildResult<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| BuildError::Configuration(format!("Cannot resolve {}: {}", path.display(), e)))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
