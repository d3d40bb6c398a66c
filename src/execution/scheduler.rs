//! Execution scheduler - bounds how many resource chains run at once

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Strategy for scheduling resource chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One chain at a time, in plan order
    Sequential,

    /// Every chain at once
    #[default]
    Parallel,

    /// At most N chains at once
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Maximum number of chains in flight, `None` for unbounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            SchedulingStrategy::Sequential => Some(1),
            SchedulingStrategy::Parallel => None,
            SchedulingStrategy::LimitedParallel(max) => Some((*max).max(1)),
        }
    }
}

impl std::fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingStrategy::Sequential => write!(f, "sequential"),
            SchedulingStrategy::Parallel => write!(f, "parallel"),
            SchedulingStrategy::LimitedParallel(max) => write!(f, "parallel (max {})", max),
        }
    }
}

/// Hands out dispatch slots according to a [`SchedulingStrategy`]
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
    slots: Option<Arc<Semaphore>>,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            strategy,
            slots: strategy.limit().map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Wait for a free slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.slots {
            // The semaphore is never closed
            Some(slots) => slots.clone().acquire_owned().await.ok(),
            None => None,
        }
    }

    /// Free slots right now (`None` when unbounded)
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }
}
