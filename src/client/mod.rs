//! Boundary to the remote training service.
//!
//! The rest of the console only talks to the service through
//! [`FetchClient`], so the poller and launcher can be driven by fakes in
//! tests and by [`HttpFetchClient`] in the binary.

pub mod http;
pub mod model;

pub use http::HttpFetchClient;
pub use model::{
    default_pretrained, GptTrainingRequest, LogRequest, LogResponse, SovitsTrainingRequest, StartedJob,
    TrainingRequest, DEFAULT_MAX_LINES,
};

use async_trait::async_trait;

use crate::error::ConsoleError;
use crate::state::{LogPage, ProcessKind};

/// Calls the console makes against the training service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetch up to `max_lines` lines of one channel starting at `offset`.
    /// Re-issuing the same request after a failure is harmless.
    async fn fetch_logs(&self, request: &LogRequest) -> Result<LogPage, ConsoleError>;

    /// Ask the launcher to start a training process.
    async fn start_job(&self, request: &TrainingRequest) -> Result<StartedJob, ConsoleError>;

    /// Check that the service is up.
    async fn probe(&self) -> Result<(), ConsoleError>;

    /// Paths of the trained weights the service can start a `kind` job from.
    async fn list_weights(&self, kind: ProcessKind) -> Result<Vec<String>, ConsoleError>;
}
