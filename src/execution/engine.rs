//! Build engine - coordinates a whole build run

use crate::core::config::BuildMode;
use crate::core::error::{BuildError, BuildResult, StepError};
use crate::core::pipeline::Pipeline;
use crate::core::plan::{Chain, Plan};
use crate::core::resource::{ArtifactSummary, EmittedAsset};
use crate::core::state::{BuildReport, ExecutionStatus, ResultCollector};
use crate::execution::cancel::CancellationFlag;
use crate::execution::emitter::OutputWriter;
use crate::execution::executor::{ChainOutcome, StepExecutor};
use crate::execution::scheduler::{ExecutionScheduler, SchedulingStrategy};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a build
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    BuildStarted {
        build_id: Uuid,
        name: String,
        mode: BuildMode,
        resources: usize,
        steps: usize,
    },
    StepStarted {
        resource: String,
        step: String,
    },
    StepCompleted {
        resource: String,
        step: String,
        artifact: ArtifactSummary,
    },
    StepFailed {
        resource: String,
        step: String,
        error: StepError,
        fatal: bool,
    },
    ResourceCancelled {
        resource: String,
    },
    AssetEmitted {
        asset: EmittedAsset,
    },
    BuildCompleted {
        build_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to registered handlers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    /// Add an event handler
    pub async fn subscribe<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

/// Runs plans for one pipeline
pub struct BuildEngine {
    name: String,
    mode: BuildMode,
    scheduler: ExecutionScheduler,
    writer: Arc<OutputWriter>,
    executor: Arc<StepExecutor>,
    events: EventBus,
}

impl BuildEngine {
    pub fn new(pipeline: &Pipeline, strategy: SchedulingStrategy) -> Self {
        let events = EventBus::default();
        let writer = Arc::new(OutputWriter::for_pipeline(pipeline));
        let executor = Arc::new(StepExecutor::new(writer.clone(), pipeline.settings, events.clone()));

        Self {
            name: pipeline.name.clone(),
            mode: pipeline.mode(),
            scheduler: ExecutionScheduler::new(strategy),
            writer,
            executor,
            events,
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler).await;
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.scheduler.strategy()
    }

    /// Execute a plan.
    ///
    /// Transform chains run concurrently under the scheduling strategy, then
    /// plugin chains run one by one against everything emitted so far.
    /// Isolated failures are reported in the returned [`BuildReport`]; a
    /// fatal failure aborts the run and is returned as
    /// [`BuildError::StepExecution`].
    pub async fn run(&self, plan: &Plan, cancel: &CancellationFlag) -> BuildResult<BuildReport> {
        let build_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %build_id,
            name = %self.name,
            mode = %self.mode,
            resources = plan.chains().len(),
            steps = plan.len(),
            strategy = %self.scheduler.strategy(),
            "Starting build"
        );
        self.events
            .emit(ExecutionEvent::BuildStarted {
                build_id,
                name: self.name.clone(),
                mode: self.mode,
                resources: plan.chains().len(),
                steps: plan.len(),
            })
            .await;

        self.writer.prepare().await?;

        let collector = Arc::new(ResultCollector::new());
        let abort = CancellationFlag::new();

        let transforms: Vec<Chain> = plan.transform_chains().cloned().collect();
        if let Err(err) = self.run_transforms(transforms, cancel, &abort, &collector).await {
            return Err(self.abort_build(build_id, err).await);
        }

        for chain in plan.emit_chains() {
            let emitted = collector.emitted().await;
            let outcome = self
                .executor
                .run_chain_guarded(chain, &emitted, cancel, &abort, &collector)
                .await;
            if let ChainOutcome::Failed {
                step,
                error,
                fatal: true,
            } = outcome
            {
                let err = BuildError::StepExecution {
                    resource: chain.resource.path.clone(),
                    step,
                    source: error,
                };
                return Err(self.abort_build(build_id, err).await);
            }
        }

        let emitted = collector.emitted().await;
        if !cancel.is_cancelled() {
            self.writer.write_manifest(&emitted).await?;
        }

        // Plan order by resource, recording order within a resource
        let order: HashMap<&str, usize> = plan
            .chains()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.resource.path.as_str(), i))
            .collect();
        let mut results = collector.results().await;
        results.sort_by_key(|r| order.get(r.resource.as_str()).copied().unwrap_or(usize::MAX));

        let status = if cancel.is_cancelled() {
            ExecutionStatus::Cancelled
        } else if results.iter().any(|r| r.is_failure()) {
            ExecutionStatus::CompletedWithFailures
        } else {
            ExecutionStatus::Completed
        };

        let report = BuildReport {
            build_id,
            name: self.name.clone(),
            mode: self.mode,
            status,
            started_at,
            completed_at: Utc::now(),
            results,
            emitted,
        };

        info!(
            %build_id,
            status = ?status,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            cancelled = report.cancelled_count(),
            files = report.emitted.len(),
            duration_ms = report.duration_ms(),
            "Build finished"
        );
        self.events
            .emit(ExecutionEvent::BuildCompleted { build_id, status })
            .await;

        Ok(report)
    }

    async fn run_transforms(
        &self,
        chains: Vec<Chain>,
        cancel: &CancellationFlag,
        abort: &CancellationFlag,
        collector: &Arc<ResultCollector>,
    ) -> BuildResult<()> {
        let mut tasks: JoinSet<(String, ChainOutcome)> = JoinSet::new();
        let mut fatal = None;

        for chain in chains {
            let permit = self.scheduler.acquire().await;

            while let Some(joined) = tasks.try_join_next() {
                if let Some(err) = fatal_error(joined) {
                    fatal = Some(err);
                }
            }
            if fatal.is_some() || abort.is_cancelled() {
                break;
            }

            if cancel.is_cancelled() {
                self.executor
                    .cancel_steps(&chain.resource, &chain.steps, collector)
                    .await;
                continue;
            }

            let executor = self.executor.clone();
            let collector = collector.clone();
            let cancel = cancel.clone();
            let abort = abort.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = executor
                    .run_chain_guarded(&chain, &[], &cancel, &abort, &collector)
                    .await;
                (chain.resource.path, outcome)
            });
        }

        if fatal.is_none() {
            while let Some(joined) = tasks.join_next().await {
                if let Some(err) = fatal_error(joined) {
                    fatal = Some(err);
                    break;
                }
            }
        }

        match fatal {
            Some(err) => {
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                Err(err)
            }
            None => Ok(()),
        }
    }

    async fn abort_build(&self, build_id: Uuid, err: BuildError) -> BuildError {
        error!(%build_id, error = %err, "Build aborted");
        self.events
            .emit(ExecutionEvent::BuildCompleted {
                build_id,
                status: ExecutionStatus::Failed,
            })
            .await;
        err
    }
}

fn fatal_error(joined: Result<(String, ChainOutcome), JoinError>) -> Option<BuildError> {
    match joined {
        Ok((
            resource,
            ChainOutcome::Failed {
                step,
                error,
                fatal: true,
            },
        )) => Some(BuildError::StepExecution {
            resource,
            step,
            source: error,
        }),
        Ok(_) => None,
        // Chains are guarded against panics, so only aborted tasks end here
        Err(err) => {
            warn!(error = %err, "Chain task ended abnormally");
            None
        }
    }
}
