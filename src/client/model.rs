//! Wire types for the training service.

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::state::{Channel, JobKey, JobStart, LogPage, LogRefs, ModelVersion, ProcessKind};

/// Default page size for log requests.
pub const DEFAULT_MAX_LINES: u32 = 100;

pub const DEFAULT_PRETRAINED_S2G: &str = "GPT_SoVITS/pretrained_models/gsv-v2final-pretrained/s2G2333k.pth";
pub const DEFAULT_PRETRAINED_S2D: &str = "GPT_SoVITS/pretrained_models/gsv-v2final-pretrained/s2D2333k.pth";
pub const DEFAULT_PRETRAINED_S1: &str =
    "GPT_SoVITS/pretrained_models/gsv-v2final-pretrained/s1bert25hz-5kh-longer-epoch=12-step=369668.ckpt";

/// Pretrained checkpoint a new job of `kind` starts from unless told otherwise:
/// the SoVITS generator or the GPT S1 checkpoint.
pub fn default_pretrained(kind: ProcessKind) -> &'static str {
    match kind {
        ProcessKind::Sovits => DEFAULT_PRETRAINED_S2G,
        ProcessKind::Gpt => DEFAULT_PRETRAINED_S1,
    }
}

/// Body of `POST /training_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRequest {
    pub experiment_name: String,
    pub process_type: ProcessKind,
    pub log_type: Channel,
    pub version: ModelVersion,
    pub offset: u64,
    pub max_lines: u32,
}

impl LogRequest {
    pub fn new(key: &JobKey, channel: Channel, offset: u64, max_lines: u32) -> Self {
        Self {
            experiment_name: key.experiment_name().to_string(),
            process_type: key.process_kind(),
            log_type: channel,
            version: key.version(),
            offset,
            max_lines,
        }
    }
}

/// Response of `POST /training_logs`.
///
/// The service only sends `success` when it is reporting a failure inside a
/// 2xx body, so an absent flag reads as success.
#[derive(Debug, Clone, Deserialize)]
pub struct LogResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub log_lines: Option<Vec<String>>,
    #[serde(default)]
    pub current_offset: Option<u64>,
    #[serde(default)]
    pub next_offset: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl LogResponse {
    /// Convert into a page. A success without `next_offset` keeps the cursor
    /// at the offset that was requested.
    pub fn into_page(self, requested_offset: u64) -> Result<LogPage, ConsoleError> {
        if !self.success {
            return Err(ConsoleError::Rejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "failed to fetch training logs".to_string()),
            ));
        }
        Ok(LogPage {
            lines: self.log_lines.unwrap_or_default(),
            next_offset: self.next_offset.unwrap_or(requested_offset),
        })
    }
}

/// Body of `POST /train_sovits`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SovitsTrainingRequest {
    pub experiment_name: String,
    pub batch_size: u32,
    pub total_epoch: u32,
    /// v1/v2 only.
    pub text_low_lr_rate: f32,
    pub if_save_latest: bool,
    pub if_save_every_weights: bool,
    pub save_every_epoch: u32,
    pub gpu_ids: String,
    #[serde(rename = "pretrained_s2G")]
    pub pretrained_s2g: String,
    #[serde(rename = "pretrained_s2D")]
    pub pretrained_s2d: String,
    /// v3 only.
    pub if_grad_ckpt: bool,
    /// v3 only; one of 16, 32, 64, 128.
    pub lora_rank: String,
    pub version: ModelVersion,
}

impl SovitsTrainingRequest {
    pub fn new(experiment_name: &str) -> Self {
        Self {
            experiment_name: experiment_name.to_string(),
            batch_size: 16,
            total_epoch: 8,
            text_low_lr_rate: 0.4,
            if_save_latest: true,
            if_save_every_weights: true,
            save_every_epoch: 4,
            gpu_ids: "0".to_string(),
            pretrained_s2g: DEFAULT_PRETRAINED_S2G.to_string(),
            pretrained_s2d: DEFAULT_PRETRAINED_S2D.to_string(),
            if_grad_ckpt: false,
            lora_rank: "32".to_string(),
            version: ModelVersion::default(),
        }
    }
}

/// Body of `POST /train_gpt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GptTrainingRequest {
    pub experiment_name: String,
    pub batch_size: u32,
    pub total_epoch: u32,
    pub if_dpo: bool,
    pub if_save_latest: bool,
    pub if_save_every_weights: bool,
    pub save_every_epoch: u32,
    pub gpu_ids: String,
    pub pretrained_s1: String,
    pub version: ModelVersion,
}

impl GptTrainingRequest {
    pub fn new(experiment_name: &str) -> Self {
        Self {
            experiment_name: experiment_name.to_string(),
            batch_size: 16,
            total_epoch: 15,
            if_dpo: false,
            if_save_latest: true,
            if_save_every_weights: true,
            save_every_epoch: 5,
            gpu_ids: "0".to_string(),
            pretrained_s1: DEFAULT_PRETRAINED_S1.to_string(),
            version: ModelVersion::default(),
        }
    }
}

/// A request to start either kind of training.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingRequest {
    Sovits(SovitsTrainingRequest),
    Gpt(GptTrainingRequest),
}

impl TrainingRequest {
    /// A request with default hyperparameters.
    pub fn new(kind: ProcessKind, experiment_name: &str, version: ModelVersion) -> Self {
        match kind {
            ProcessKind::Sovits => TrainingRequest::Sovits(SovitsTrainingRequest {
                version,
                ..SovitsTrainingRequest::new(experiment_name)
            }),
            ProcessKind::Gpt => TrainingRequest::Gpt(GptTrainingRequest {
                version,
                ..GptTrainingRequest::new(experiment_name)
            }),
        }
    }

    /// Start from `path`: the S2G generator for SoVITS, the S1 checkpoint for GPT.
    pub fn with_pretrained(mut self, path: &str) -> Self {
        match &mut self {
            TrainingRequest::Sovits(req) => req.pretrained_s2g = path.to_string(),
            TrainingRequest::Gpt(req) => req.pretrained_s1 = path.to_string(),
        }
        self
    }

    pub fn process_kind(&self) -> ProcessKind {
        match self {
            TrainingRequest::Sovits(_) => ProcessKind::Sovits,
            TrainingRequest::Gpt(_) => ProcessKind::Gpt,
        }
    }

    pub fn experiment_name(&self) -> &str {
        match self {
            TrainingRequest::Sovits(req) => &req.experiment_name,
            TrainingRequest::Gpt(req) => &req.experiment_name,
        }
    }

    pub fn version(&self) -> ModelVersion {
        match self {
            TrainingRequest::Sovits(req) => req.version,
            TrainingRequest::Gpt(req) => req.version,
        }
    }

    /// Key of the job this request would start.
    pub fn key(&self) -> Result<JobKey, ConsoleError> {
        JobKey::from_parts(self.experiment_name(), self.process_kind(), self.version())
    }

    /// Service path that starts this kind of training.
    pub fn path(&self) -> &'static str {
        match self {
            TrainingRequest::Sovits(_) => "train_sovits",
            TrainingRequest::Gpt(_) => "train_gpt",
        }
    }
}

/// Successful response of a training start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StartedJob {
    #[serde(default)]
    pub process_id: Option<u32>,
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub stdout_log: Option<String>,
    #[serde(default)]
    pub stderr_log: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StartedJob {
    /// What the registry needs to track the job started by `request`.
    pub fn into_job_start(self, request: &TrainingRequest) -> JobStart {
        let mut start = JobStart::new(
            request.experiment_name(),
            request.process_kind().as_str(),
            request.version().as_str(),
        );
        start.process_id = self.process_id;
        if self.stdout_log.is_some() || self.stderr_log.is_some() {
            start.log_refs = Some(LogRefs {
                stdout: self.stdout_log,
                stderr: self.stderr_log,
            });
        }
        start
    }
}

/// Error payload returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
}

impl ErrorBody {
    pub fn summary(&self, fallback: &str) -> String {
        match (&self.message, &self.error) {
            (Some(message), Some(error)) => format!("{message}: {error}"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => fallback.to_string(),
        }
    }
}

/// Service path listing the trained weights of `kind`.
pub fn weight_list_path(kind: ProcessKind) -> &'static str {
    match kind {
        ProcessKind::Sovits => "list_sovits_weights",
        ProcessKind::Gpt => "list_gpt_weights",
    }
}

/// One entry of a weight listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeightInfo {
    pub path: String,
}

/// Response of `GET /list_sovits_weights` and `GET /list_gpt_weights`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WeightList {
    #[serde(default)]
    pub models: Vec<WeightInfo>,
}

impl WeightList {
    pub fn into_paths(self) -> Vec<String> {
        self.models.into_iter().map(|model| model.path).collect()
    }
}

/// Response of `GET /probe`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn log_request_body_is_snake_case_and_lowercase() {
        let key = JobKey::new("singer1", "SoVITS", "v2").unwrap();
        let body = serde_json::to_value(LogRequest::new(&key, Channel::Stderr, 42, DEFAULT_MAX_LINES)).unwrap();
        assert_eq!(
            body,
            json!({
                "experiment_name": "singer1",
                "process_type": "sovits",
                "log_type": "stderr",
                "version": "v2",
                "offset": 42,
                "max_lines": 100,
            })
        );
    }

    #[test]
    fn service_log_body_maps_to_page() {
        let response: LogResponse = serde_json::from_value(json!({
            "experiment_name": "singer1",
            "log_type": "stdout",
            "process_type": "sovits",
            "log_lines": ["epoch 1 start"],
            "current_offset": 0,
            "next_offset": 42,
        }))
        .unwrap();
        assert_eq!(
            response.into_page(0).unwrap(),
            LogPage {
                lines: vec!["epoch 1 start".to_string()],
                next_offset: 42,
            }
        );
    }

    #[test]
    fn log_response_without_cursor_keeps_requested_offset() {
        let response: LogResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(
            response.into_page(17).unwrap(),
            LogPage {
                lines: Vec::new(),
                next_offset: 17,
            }
        );
    }

    #[test]
    fn explicit_success_flag_is_honoured() {
        let response: LogResponse = serde_json::from_value(json!({
            "success": true,
            "log_lines": ["a"],
            "next_offset": 2,
        }))
        .unwrap();
        assert_eq!(response.into_page(0).unwrap().next_offset, 2);
    }

    #[test]
    fn unsuccessful_log_response_is_rejected() {
        let response: LogResponse = serde_json::from_value(json!({
            "success": false,
            "error": "log file not found",
        }))
        .unwrap();
        assert_eq!(
            response.into_page(0).unwrap_err(),
            ConsoleError::Rejected("log file not found".into())
        );
    }

    #[test]
    fn sovits_request_uses_service_field_names() {
        let body = serde_json::to_value(SovitsTrainingRequest::new("singer1")).unwrap();
        assert_eq!(body["pretrained_s2G"], DEFAULT_PRETRAINED_S2G);
        assert_eq!(body["pretrained_s2D"], DEFAULT_PRETRAINED_S2D);
        assert_eq!(body["batch_size"], 16);
        assert_eq!(body["total_epoch"], 8);
        assert_eq!(body["lora_rank"], "32");
        assert_eq!(body["version"], "v2");
    }

    #[test]
    fn gpt_defaults() {
        let req = GptTrainingRequest::new("singer1");
        assert_eq!(req.total_epoch, 15);
        assert_eq!(req.save_every_epoch, 5);
        assert!(!req.if_dpo);
        assert_eq!(TrainingRequest::Gpt(req).path(), "train_gpt");
    }

    #[test]
    fn started_job_becomes_job_start() {
        let request = TrainingRequest::Sovits(SovitsTrainingRequest::new("singer1"));
        let started: StartedJob = serde_json::from_value(json!({
            "message": "SoVITS training started",
            "process_id": 3131,
            "experiment_name": "singer1",
            "stdout_log": "logs/singer1/s2_stdout.log",
            "stderr_log": "logs/singer1/s2_stderr.log",
        }))
        .unwrap();

        let start = started.into_job_start(&request);
        assert_eq!(start.key().unwrap(), request.key().unwrap());
        assert_eq!(start.process_id, Some(3131));
        assert_eq!(
            start.log_refs.unwrap().stdout.as_deref(),
            Some("logs/singer1/s2_stdout.log")
        );
    }

    #[test]
    fn request_built_from_kind_carries_version_and_weight() {
        let request = TrainingRequest::new(ProcessKind::Sovits, "singer1", ModelVersion::V3)
            .with_pretrained("SoVITS_weights_v3/singer0_e8_s96.pth");
        match &request {
            TrainingRequest::Sovits(req) => {
                assert_eq!(req.version, ModelVersion::V3);
                assert_eq!(req.pretrained_s2g, "SoVITS_weights_v3/singer0_e8_s96.pth");
                assert_eq!(req.pretrained_s2d, DEFAULT_PRETRAINED_S2D);
            }
            other => panic!("expected a SoVITS request, got {other:?}"),
        }

        let request = TrainingRequest::new(ProcessKind::Gpt, "singer1", ModelVersion::V1);
        match request.with_pretrained("GPT_weights/singer0-e15.ckpt") {
            TrainingRequest::Gpt(req) => {
                assert_eq!(req.version, ModelVersion::V1);
                assert_eq!(req.pretrained_s1, "GPT_weights/singer0-e15.ckpt");
            }
            other => panic!("expected a GPT request, got {other:?}"),
        }
    }

    #[test]
    fn weight_listing_yields_paths() {
        let list: WeightList = serde_json::from_value(json!({
            "models": [
                { "name": "singer0-e15.ckpt", "path": "GPT_weights_v2/singer0-e15.ckpt" },
                { "name": "singer1-e10.ckpt", "path": "GPT_weights_v2/singer1-e10.ckpt" },
            ]
        }))
        .unwrap();
        assert_eq!(
            list.into_paths(),
            vec![
                "GPT_weights_v2/singer0-e15.ckpt".to_string(),
                "GPT_weights_v2/singer1-e10.ckpt".to_string(),
            ]
        );
        assert_eq!(weight_list_path(ProcessKind::Gpt), "list_gpt_weights");
    }

    #[test]
    fn error_body_summary() {
        let body = ErrorBody {
            message: Some("Failed to start GPT training".into()),
            error: Some("CUDA out of memory".into()),
            traceback: None,
        };
        assert_eq!(body.summary("x"), "Failed to start GPT training: CUDA out of memory");
        assert_eq!(ErrorBody::default().summary("fallback"), "fallback");
    }
}
