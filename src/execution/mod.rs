//! Build execution: scheduling, chain execution, output and watch mode

pub mod cancel;
pub mod emitter;
pub mod engine;
pub mod executor;
pub mod notify;
pub mod scheduler;
pub mod watch;

pub use cancel::CancellationFlag;
pub use emitter::OutputWriter;
pub use engine::{BuildEngine, EventBus, EventHandler, ExecutionEvent};
pub use executor::{ChainOutcome, StepExecutor};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
pub use watch::{ChangeKind, ResourceChange, WatchSubscription};
