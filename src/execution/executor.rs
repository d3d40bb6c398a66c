//! Step executor - runs one resource chain through its steps

use crate::core::config::BuildSettings;
use crate::core::error::StepError;
use crate::core::plan::Chain;
use crate::core::resource::{Artifact, EmittedAsset, Resource};
use crate::core::state::{ExecutionResult, ResultCollector};
use crate::core::step::Step;
use crate::execution::cancel::CancellationFlag;
use crate::execution::emitter::OutputWriter;
use crate::execution::engine::{EventBus, ExecutionEvent};
use crate::handlers::StepInput;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pseudo step name under which output write failures are recorded
pub const EMIT_STEP: &str = "emit";

/// How a chain ended
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    /// Every step succeeded and the artifact was written
    Completed { emitted: Vec<EmittedAsset> },
    /// A step failed; later steps of the chain were not run
    Failed {
        step: String,
        error: StepError,
        fatal: bool,
    },
    /// Cancellation was observed before the chain finished
    Cancelled,
}

/// Runs resource chains, recording one result per (resource, step)
pub struct StepExecutor {
    writer: Arc<OutputWriter>,
    settings: BuildSettings,
    events: EventBus,
}

impl StepExecutor {
    pub fn new(writer: Arc<OutputWriter>, settings: BuildSettings, events: EventBus) -> Self {
        Self {
            writer,
            settings,
            events,
        }
    }

    /// Run a chain to completion, failure or cancellation.
    ///
    /// `cancel` is the caller's flag, `abort` is raised by fatal failures;
    /// both are checked before each step. A fatal failure raises `abort`
    /// before this returns.
    pub async fn run_chain(
        &self,
        chain: &Chain,
        emitted: &[EmittedAsset],
        cancel: &CancellationFlag,
        abort: &CancellationFlag,
        collector: &ResultCollector,
    ) -> ChainOutcome {
        let resource = &chain.resource;
        let Some(first) = chain.steps.first() else {
            return ChainOutcome::Completed { emitted: Vec::new() };
        };

        if cancel.is_cancelled() || abort.is_cancelled() {
            self.cancel_steps(resource, &chain.steps, collector).await;
            return ChainOutcome::Cancelled;
        }

        let contents = match resource.load().await {
            Ok(contents) => contents,
            Err(error) => return self.fail(resource, first, error, abort, collector).await,
        };
        let mut artifact = Artifact::new(resource.path.clone(), contents);

        for (index, step) in chain.steps.iter().enumerate() {
            if cancel.is_cancelled() || abort.is_cancelled() {
                self.cancel_steps(resource, &chain.steps[index..], collector).await;
                return ChainOutcome::Cancelled;
            }

            debug!(resource = %resource.path, step = %step.name, "Running step");
            self.events
                .emit(ExecutionEvent::StepStarted {
                    resource: resource.path.clone(),
                    step: step.name.clone(),
                })
                .await;

            let input = StepInput {
                resource,
                artifact,
                emitted,
                settings: self.settings,
            };

            match run_step(step, input).await {
                Ok(next) => {
                    let summary = next.summary();
                    collector
                        .record(ExecutionResult::success(&resource.path, &step.name, summary.clone()))
                        .await;
                    self.events
                        .emit(ExecutionEvent::StepCompleted {
                            resource: resource.path.clone(),
                            step: step.name.clone(),
                            artifact: summary,
                        })
                        .await;
                    artifact = next;
                }
                Err(error) => return self.fail(resource, step, error, abort, collector).await,
            }
        }

        match self.writer.write(resource, &artifact).await {
            Ok(assets) => {
                for asset in &assets {
                    self.events
                        .emit(ExecutionEvent::AssetEmitted { asset: asset.clone() })
                        .await;
                }
                collector.record_emitted(assets.clone()).await;
                info!(resource = %resource.path, files = assets.len(), "Resource built");
                ChainOutcome::Completed { emitted: assets }
            }
            Err(error) => {
                warn!(resource = %resource.path, error = %error, "Failed to write output");
                self.emit_failed(resource, error, collector).await
            }
        }
    }

    /// Like [`run_chain`](Self::run_chain), but a panic anywhere in the chain
    /// is recorded as an `Aborted` failure instead of unwinding into the caller
    pub async fn run_chain_guarded(
        &self,
        chain: &Chain,
        emitted: &[EmittedAsset],
        cancel: &CancellationFlag,
        abort: &CancellationFlag,
        collector: &ResultCollector,
    ) -> ChainOutcome {
        let run = AssertUnwindSafe(self.run_chain(chain, emitted, cancel, abort, collector))
            .catch_unwind()
            .await;
        let message = match run {
            Ok(outcome) => return outcome,
            Err(panic) => panic_message(panic),
        };

        // Blame the first step without a result, or the write if every step finished
        let results = collector.results().await;
        let resource = &chain.resource;
        let pending = chain.steps.iter().find(|step| {
            !results
                .iter()
                .any(|r| r.resource == resource.path && r.step == step.name)
        });
        let error = StepError::Aborted(message);
        match pending {
            Some(step) => self.fail(resource, step, error, abort, collector).await,
            None => {
                error!(resource = %resource.path, error = %error, "Chain panicked after its last step");
                self.emit_failed(resource, error, collector).await
            }
        }
    }

    /// Record `Cancelled` for every listed step of a resource
    pub async fn cancel_steps(&self, resource: &Resource, steps: &[Arc<Step>], collector: &ResultCollector) {
        for step in steps {
            collector
                .record(ExecutionResult::cancelled(&resource.path, &step.name))
                .await;
        }
        self.events
            .emit(ExecutionEvent::ResourceCancelled {
                resource: resource.path.clone(),
            })
            .await;
    }

    async fn emit_failed(&self, resource: &Resource, error: StepError, collector: &ResultCollector) -> ChainOutcome {
        collector
            .record(ExecutionResult::failure(&resource.path, EMIT_STEP, error.clone()))
            .await;
        self.events
            .emit(ExecutionEvent::StepFailed {
                resource: resource.path.clone(),
                step: EMIT_STEP.to_string(),
                error: error.clone(),
                fatal: false,
            })
            .await;
        ChainOutcome::Failed {
            step: EMIT_STEP.to_string(),
            error,
            fatal: false,
        }
    }

    async fn fail(
        &self,
        resource: &Resource,
        step: &Step,
        error: StepError,
        abort: &CancellationFlag,
        collector: &ResultCollector,
    ) -> ChainOutcome {
        if step.fatal {
            error!(resource = %resource.path, step = %step.name, error = %error, "Fatal step failed, aborting build");
            abort.cancel();
        } else {
            warn!(resource = %resource.path, step = %step.name, error = %error, "Step failed");
        }

        collector
            .record(ExecutionResult::failure(&resource.path, &step.name, error.clone()))
            .await;
        self.events
            .emit(ExecutionEvent::StepFailed {
                resource: resource.path.clone(),
                step: step.name.clone(),
                error: error.clone(),
                fatal: step.fatal,
            })
            .await;

        ChainOutcome::Failed {
            step: step.name.clone(),
            error,
            fatal: step.fatal,
        }
    }
}

/// Run one step, turning a handler panic into a step failure
async fn run_step(step: &Step, input: StepInput<'_>) -> Result<Artifact, StepError> {
    match AssertUnwindSafe(step.execute(input)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(StepError::Aborted(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}
