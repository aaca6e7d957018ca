//! JSON-over-HTTP implementation of [`FetchClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::model::{
    weight_list_path, ErrorBody, LogRequest, LogResponse, ProbeResponse, StartedJob, TrainingRequest, WeightList,
};
use super::FetchClient;
use crate::error::ConsoleError;
use crate::state::{LogPage, ProcessKind};

/// Default base URL of the training service.
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:6006";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the training service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetchClient {
    http: Client,
    endpoint: String,
}

impl HttpFetchClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ConsoleError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_http(http, endpoint))
    }

    /// Use an already configured `reqwest` client.
    pub fn with_http(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn error_from(response: Response, fallback: &str) -> ConsoleError {
        let status = response.status().as_u16();
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        if let Some(traceback) = &body.traceback {
            debug!(status, %traceback, "service traceback");
        }
        ConsoleError::HttpStatus {
            status,
            message: body.summary(fallback),
        }
    }
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn fetch_logs(&self, request: &LogRequest) -> Result<LogPage, ConsoleError> {
        let response = self
            .http
            .post(self.url("training_logs"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "failed to fetch training logs").await);
        }

        let body: LogResponse = response.json().await?;
        body.into_page(request.offset)
    }

    async fn start_job(&self, request: &TrainingRequest) -> Result<StartedJob, ConsoleError> {
        let builder = self.http.post(self.url(request.path()));
        let builder = match request {
            TrainingRequest::Sovits(body) => builder.json(body),
            TrainingRequest::Gpt(body) => builder.json(body),
        };
        let response = builder.send().await?;

        if !response.status().is_success() {
            let fallback = format!("failed to start {} training", request.process_kind().label());
            let err = Self::error_from(response, &fallback).await;
            warn!(experiment = request.experiment_name(), error = %err, "training start refused");
            return Err(err);
        }

        Ok(response.json().await?)
    }

    async fn probe(&self) -> Result<(), ConsoleError> {
        let response = self.http.get(self.url("probe")).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, "probe failed").await);
        }

        let body: ProbeResponse = response.json().await?;
        if body.status == "ok" {
            Ok(())
        } else {
            Err(ConsoleError::Rejected(format!("service status is `{}`", body.status)))
        }
    }

    async fn list_weights(&self, kind: ProcessKind) -> Result<Vec<String>, ConsoleError> {
        let response = self.http.get(self.url(weight_list_path(kind))).send().await?;
        if !response.status().is_success() {
            let fallback = format!("failed to list {} weights", kind.label());
            return Err(Self::error_from(response, &fallback).await);
        }

        let body: WeightList = response.json().await?;
        Ok(body.into_paths())
    }
}
