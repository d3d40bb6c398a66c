//! Test utility functions for assetline

#![allow(dead_code)]

use assetline::core::error::StepError;
use assetline::core::resource::Artifact;
use assetline::core::{BuildConfig, BuildError, BuildMode, BuildReport, Pipeline, StepOutcome};
use assetline::execution::{BuildEngine, CancellationFlag, SchedulingStrategy};
use assetline::handlers::{HandlerCatalog, StepHandler, StepInput, StepOptions};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared log of (resource, handler) invocations, in call order
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(String, String)>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, resource: &str, step: &str) {
        self.0
            .lock()
            .unwrap()
            .push((resource.to_string(), step.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }

    /// Steps invoked for one resource, in call order
    pub fn steps_for(&self, resource: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(r, _)| r == resource)
            .map(|(_, s)| s)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Handler that appends `|<name>` to the artifact and logs the call
pub struct RecordingHandler {
    name: String,
    log: CallLog,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StepHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: StepInput<'_>, _options: &StepOptions) -> Result<Artifact, StepError> {
        self.log.record(&input.resource.path, &self.name);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut artifact = input.artifact;
        artifact.contents.extend_from_slice(format!("|{}", self.name).as_bytes());
        Ok(artifact)
    }
}

/// Handler that fails, for every resource or only the listed ones
pub struct FailingHandler {
    name: String,
    log: CallLog,
    only: Vec<String>,
}

impl FailingHandler {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            only: Vec::new(),
        }
    }

    pub fn only_for(mut self, resource: &str) -> Self {
        self.only.push(resource.to_string());
        self
    }
}

#[async_trait]
impl StepHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: StepInput<'_>, _options: &StepOptions) -> Result<Artifact, StepError> {
        self.log.record(&input.resource.path, &self.name);
        let path = &input.resource.path;
        if self.only.is_empty() || self.only.contains(path) {
            return Err(StepError::Failed(format!("{} rejected {}", self.name, path)));
        }
        Ok(input.artifact)
    }
}

/// Built-in handlers plus the given test handlers
pub fn catalog_with(handlers: Vec<Arc<dyn StepHandler>>) -> HandlerCatalog {
    let mut catalog = HandlerCatalog::with_builtins();
    for handler in handlers {
        catalog.insert(handler);
    }
    catalog
}

/// Write `(relative path, contents)` pairs under `root`
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let file = root.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, contents).unwrap();
    }
}

/// Parse `yaml` as if it were `root/assetline.yaml` and resolve it
pub fn load_pipeline(
    root: &Path,
    yaml: &str,
    mode: BuildMode,
    catalog: &HandlerCatalog,
) -> Result<Pipeline, BuildError> {
    let mut config = BuildConfig::from_yaml(yaml)?;
    config.base_dir = root.to_path_buf();
    Pipeline::from_config(&config, mode, catalog)
}

/// Discover, plan and run with a fresh cancellation flag
pub async fn build(pipeline: &Pipeline, strategy: SchedulingStrategy) -> Result<BuildReport, BuildError> {
    build_with(pipeline, strategy, &CancellationFlag::new()).await
}

pub async fn build_with(
    pipeline: &Pipeline,
    strategy: SchedulingStrategy,
    cancel: &CancellationFlag,
) -> Result<BuildReport, BuildError> {
    let resources = pipeline.discover()?;
    let plan = pipeline.plan(&resources)?;
    BuildEngine::new(pipeline, strategy).run(&plan, cancel).await
}

/// Read a file from the output directory
pub fn read_output(pipeline: &Pipeline, path: &str) -> String {
    std::fs::read_to_string(pipeline.output_dir.join(path))
        .unwrap_or_else(|e| panic!("missing output {}: {}", path, e))
}

/// `(step, outcome)` labels recorded for one resource
pub fn outcomes(report: &BuildReport, resource: &str) -> Vec<(String, &'static str)> {
    report
        .results_for(resource)
        .map(|r| {
            let label = match r.outcome {
                StepOutcome::Success { .. } => "success",
                StepOutcome::Failure { .. } => "failure",
                StepOutcome::Cancelled => "cancelled",
            };
            (r.step.clone(), label)
        })
        .collect()
}

/// Output paths of every emitted file
pub fn emitted_paths(report: &BuildReport) -> Vec<String> {
    report.emitted.iter().map(|a| a.path.clone()).collect()
}

/// Assert every listed step succeeded for the resource, in order
pub fn assert_succeeded(report: &BuildReport, resource: &str, steps: &[&str]) {
    let expected: Vec<(String, &'static str)> = steps.iter().map(|s| (s.to_string(), "success")).collect();
    assert_eq!(
        outcomes(report, resource),
        expected,
        "unexpected outcomes for {}",
        resource
    );
}
