//! Error types for the console.
//!
//! Everything the library can report goes through [`ConsoleError`]. Validation
//! failures are reported to the caller before any request leaves the process;
//! transport failures are transient and are absorbed by the poller and the
//! cooldown guard instead of being propagated.

use std::time::Duration;

use thiserror::Error;

use crate::monitor::OperationClass;

/// Errors produced by the console library.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsoleError {
    /// Experiment name was empty.
    #[error("experiment name must not be empty")]
    EmptyExperimentName,

    /// Process kind is neither `sovits` nor `gpt` (case-insensitive).
    #[error("unrecognized process type `{0}` (expected `sovits` or `gpt`)")]
    InvalidProcessKind(String),

    /// Model version is not one of `v1`, `v2`, `v3`.
    #[error("unrecognized model version `{0}` (expected `v1`, `v2` or `v3`)")]
    InvalidVersion(String),

    /// A textual job key could not be split into its components.
    #[error("malformed job key `{0}` (expected `<experiment>_<process>_<version>`)")]
    InvalidJobKey(String),

    /// The service could not be reached or the response could not be read.
    #[error("training service unreachable: {0}")]
    Connectivity(String),

    /// The service answered with a non-success HTTP status.
    #[error("training service returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The service answered but reported `success: false`.
    #[error("training service rejected the request: {0}")]
    Rejected(String),

    /// Too many consecutive failures; attempts are suppressed for a while.
    #[error("{class} is cooling down, retry in {}s", display_secs(.remaining))]
    CoolingDown {
        class: OperationClass,
        remaining: Duration,
    },
}

impl ConsoleError {
    /// True for errors raised while validating a job key.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConsoleError::EmptyExperimentName
                | ConsoleError::InvalidProcessKind(_)
                | ConsoleError::InvalidVersion(_)
                | ConsoleError::InvalidJobKey(_)
        )
    }

    /// True for failures that count against the cooldown guard.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConsoleError::Connectivity(_)
                | ConsoleError::HttpStatus { .. }
                | ConsoleError::Rejected(_)
        )
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        ConsoleError::Connectivity(err.to_string())
    }
}

/// Whole seconds left, rounded up so a countdown never shows 0 while still blocked.
pub fn remaining_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn display_secs(remaining: &Duration) -> u64 {
    remaining_secs(*remaining)
}
