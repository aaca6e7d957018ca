//! Components that talk to the training service on a schedule or on demand.
//!
//! - [`Poller`] tails the logs of the job being viewed
//! - [`CooldownGuard`] suppresses calls after repeated failures
//! - [`Launcher`] starts training jobs and probes the service

pub mod cooldown;
pub mod launcher;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

pub use cooldown::{CooldownGuard, GuardPhase, OperationClass};
pub use launcher::Launcher;
pub use poller::{PollState, Poller, PollerConfig};

use std::time::Duration;

/// Default interval between log polls of the selected job.
pub const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive failures that open a cooldown window.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default length of a cooldown window.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);
