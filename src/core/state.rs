//! Execution state models

use crate::core::config::BuildMode;
use crate::core::error::StepError;
use crate::core::resource::{ArtifactSummary, EmittedAsset};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Overall build status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Build has not started
    Pending,
    /// Build is currently running
    Running,
    /// Every planned step succeeded
    Completed,
    /// Finished, but some resources failed in isolation
    CompletedWithFailures,
    /// A fatal step aborted the build
    Failed,
    /// Build was cancelled
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::CompletedWithFailures)
    }
}

/// What happened to one (resource, step) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { artifact: ArtifactSummary },
    Failure { error: StepError },
    Cancelled,
}

/// Outcome record for one (resource, step) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub resource: String,
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl ExecutionResult {
    pub fn success(resource: &str, step: &str, artifact: ArtifactSummary) -> Self {
        Self {
            resource: resource.to_string(),
            step: step.to_string(),
            outcome: StepOutcome::Success { artifact },
        }
    }

    pub fn failure(resource: &str, step: &str, error: StepError) -> Self {
        Self {
            resource: resource.to_string(),
            step: step.to_string(),
            outcome: StepOutcome::Failure { error },
        }
    }

    pub fn cancelled(resource: &str, step: &str) -> Self {
        Self {
            resource: resource.to_string(),
            step: step.to_string(),
            outcome: StepOutcome::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failure { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, StepOutcome::Cancelled)
    }
}

/// Append-only sink for results and emitted files, shared by concurrent chains
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Mutex<Vec<ExecutionResult>>,
    emitted: Mutex<Vec<EmittedAsset>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, result: ExecutionResult) {
        self.results.lock().await.push(result);
    }

    pub async fn record_emitted(&self, assets: impl IntoIterator<Item = EmittedAsset>) {
        self.emitted.lock().await.extend(assets);
    }

    /// Emitted files so far, sorted by output path
    pub async fn emitted(&self) -> Vec<EmittedAsset> {
        let mut assets = self.emitted.lock().await.clone();
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        assets
    }

    /// Results so far, in recording order
    pub async fn results(&self) -> Vec<ExecutionResult> {
        self.results.lock().await.clone()
    }
}

/// Summary of one build run
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Unique run ID
    pub build_id: Uuid,

    pub name: String,

    pub mode: BuildMode,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Per (resource, step) outcomes, ordered by resource then recording order
    pub results: Vec<ExecutionResult>,

    /// Files written, sorted by output path
    pub emitted: Vec<EmittedAsset>,
}

impl BuildReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_cancelled()).count()
    }

    /// Results for one resource path
    pub fn results_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a ExecutionResult> + 'a {
        self.results.iter().filter(move |r| r.resource == resource)
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
