//! Starting training jobs.

use std::sync::Arc;

use tracing::{info, warn};

use super::{CooldownGuard, OperationClass};
use crate::client::{FetchClient, TrainingRequest};
use crate::error::ConsoleError;
use crate::state::{JobStart, ProcessKind};

/// Issues guarded start, probe and weight listing calls against the service.
#[derive(Clone)]
pub struct Launcher {
    client: Arc<dyn FetchClient>,
    guard: Arc<CooldownGuard>,
}

impl Launcher {
    pub fn new(client: Arc<dyn FetchClient>, guard: Arc<CooldownGuard>) -> Self {
        Self { client, guard }
    }

    /// Start a training job and return what the registry needs to track it.
    ///
    /// The job key is validated before anything is sent.
    pub async fn launch(&self, request: &TrainingRequest) -> Result<JobStart, ConsoleError> {
        let key = request.key()?;
        self.guard.check(OperationClass::JobStart)?;

        match self.client.start_job(request).await {
            Ok(started) => {
                self.guard.record_success(OperationClass::JobStart);
                info!(job = %key, pid = ?started.process_id, "training started");
                Ok(started.into_job_start(request))
            }
            Err(err) => {
                if err.is_transient() {
                    self.guard.record_failure(OperationClass::JobStart);
                }
                warn!(job = %key, error = %err, "training failed to start");
                Err(err)
            }
        }
    }

    /// Check that the service is reachable.
    pub async fn probe(&self) -> Result<(), ConsoleError> {
        self.guard.check(OperationClass::Probe)?;
        let result = self.client.probe().await;
        self.record(OperationClass::Probe, &result);
        result
    }

    /// Trained weights a new `kind` job can start from.
    pub async fn list_weights(&self, kind: ProcessKind) -> Result<Vec<String>, ConsoleError> {
        self.guard.check(OperationClass::WeightList)?;
        let result = self.client.list_weights(kind).await;
        self.record(OperationClass::WeightList, &result);
        match &result {
            Ok(paths) => info!(%kind, count = paths.len(), "listed trained weights"),
            Err(err) => warn!(%kind, error = %err, "could not list trained weights"),
        }
        result
    }

    fn record<T>(&self, class: OperationClass, result: &Result<T, ConsoleError>) {
        match result {
            Ok(_) => self.guard.record_success(class),
            Err(err) if err.is_transient() => self.guard.record_failure(class),
            Err(_) => {}
        }
    }
}
