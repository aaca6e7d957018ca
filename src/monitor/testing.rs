//! A [`FetchClient`] whose log fetches stay pending until a test answers them.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::client::{FetchClient, LogRequest, StartedJob, TrainingRequest};
use crate::error::ConsoleError;
use crate::state::{LogPage, ProcessKind};

type Reply = Result<LogPage, ConsoleError>;

struct Pending {
    request: LogRequest,
    responder: Option<oneshot::Sender<Reply>>,
}

#[derive(Default)]
pub(crate) struct ScriptedClient {
    calls: Mutex<Vec<Pending>>,
}

impl ScriptedClient {
    /// Every log request seen so far, in call order.
    pub(crate) fn requests(&self) -> Vec<LogRequest> {
        self.calls.lock().unwrap().iter().map(|p| p.request.clone()).collect()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Resolve the `index`-th request.
    pub(crate) fn respond(&self, index: usize, reply: Reply) {
        let responder = self.calls.lock().unwrap()[index]
            .responder
            .take()
            .expect("request already answered");
        let _ = responder.send(reply);
    }

    /// Let spawned timer and fetch tasks run.
    pub(crate) async fn settle(&self) {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl FetchClient for ScriptedClient {
    async fn fetch_logs(&self, request: &LogRequest) -> Result<LogPage, ConsoleError> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(Pending {
            request: request.clone(),
            responder: Some(tx),
        });
        rx.await
            .unwrap_or_else(|_| Err(ConsoleError::Connectivity("responder dropped".into())))
    }

    async fn start_job(&self, _request: &TrainingRequest) -> Result<StartedJob, ConsoleError> {
        Err(ConsoleError::Rejected("not scripted".into()))
    }

    async fn probe(&self) -> Result<(), ConsoleError> {
        Ok(())
    }

    async fn list_weights(&self, _kind: ProcessKind) -> Result<Vec<String>, ConsoleError> {
        Ok(Vec::new())
    }
}
