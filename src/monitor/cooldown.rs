//! Failure backoff shared by guarded operations.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};
use crate::error::{remaining_secs, ConsoleError};

/// Kind of operation a guard attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    LogFetch,
    JobStart,
    Probe,
    WeightList,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::LogFetch => write!(f, "log fetch"),
            OperationClass::JobStart => write!(f, "job start"),
            OperationClass::Probe => write!(f, "probe"),
            OperationClass::WeightList => write!(f, "weight list"),
        }
    }
}

/// Observable phase of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Ready,
    Cooldown { remaining: Duration },
}

#[derive(Debug, Default)]
struct GuardState {
    consecutive_failures: u32,
    cooling_until: Option<Instant>,
}

/// Counts consecutive failures across every operation class sharing this
/// instance. Reaching the threshold suppresses all of them for a fixed window.
#[derive(Debug)]
pub struct CooldownGuard {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<GuardState>,
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

impl CooldownGuard {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(GuardState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails with [`ConsoleError::CoolingDown`] while the window is open.
    pub fn check(&self, class: OperationClass) -> Result<(), ConsoleError> {
        match self.phase() {
            GuardPhase::Ready => Ok(()),
            GuardPhase::Cooldown { remaining } => Err(ConsoleError::CoolingDown { class, remaining }),
        }
    }

    pub fn phase(&self) -> GuardPhase {
        let mut state = self.lock();
        match state.cooling_until {
            Some(until) => {
                let now = Instant::now();
                if now < until {
                    GuardPhase::Cooldown { remaining: until - now }
                } else {
                    state.cooling_until = None;
                    GuardPhase::Ready
                }
            }
            None => GuardPhase::Ready,
        }
    }

    /// Time left in the current window, if one is open.
    pub fn remaining(&self) -> Option<Duration> {
        match self.phase() {
            GuardPhase::Ready => None,
            GuardPhase::Cooldown { remaining } => Some(remaining),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn record_success(&self, class: OperationClass) {
        let mut state = self.lock();
        if state.consecutive_failures > 0 {
            info!(%class, failures = state.consecutive_failures, "guarded operation recovered");
        }
        state.consecutive_failures = 0;
    }

    /// Count a failure; opens the window once the threshold is reached.
    pub fn record_failure(&self, class: OperationClass) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures < self.threshold {
            return;
        }

        let now = Instant::now();
        let already_cooling = state.cooling_until.is_some_and(|until| now < until);
        if !already_cooling {
            state.cooling_until = Some(now + self.cooldown);
            warn!(
                %class,
                failures = state.consecutive_failures,
                cooldown_secs = remaining_secs(self.cooldown),
                "too many consecutive failures, cooling down"
            );
        }
    }
}
