//! Training job identity and lifecycle.
//!
//! [`JobKey`] is the only identity used to address a job anywhere in the
//! console. All normalization happens when a key is built, so two keys that
//! compare equal always refer to the same job and the same log buffers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ConsoleError;

/// Which model a training process is fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Sovits,
    Gpt,
}

impl ProcessKind {
    /// Lowercase name used on the wire and in key strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Sovits => "sovits",
            ProcessKind::Gpt => "gpt",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessKind::Sovits => "SoVITS",
            ProcessKind::Gpt => "GPT",
        }
    }
}

impl FromStr for ProcessKind {
    type Err = ConsoleError;

    /// Case-insensitive: `SOVITS`, `SoVITS` and `sovits` are the same kind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sovits" => Ok(ProcessKind::Sovits),
            "gpt" => Ok(ProcessKind::Gpt),
            _ => Err(ConsoleError::InvalidProcessKind(s.to_string())),
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPT-SoVITS model generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    V1,
    #[default]
    V2,
    V3,
}

impl ModelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V1 => "v1",
            ModelVersion::V2 => "v2",
            ModelVersion::V3 => "v3",
        }
    }

    /// The following version, wrapping from v3 back to v1.
    pub fn cycled(&self) -> ModelVersion {
        match self {
            ModelVersion::V1 => ModelVersion::V2,
            ModelVersion::V2 => ModelVersion::V3,
            ModelVersion::V3 => ModelVersion::V1,
        }
    }
}

impl FromStr for ModelVersion {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(ModelVersion::V1),
            "v2" => Ok(ModelVersion::V2),
            "v3" => Ok(ModelVersion::V3),
            _ => Err(ConsoleError::InvalidVersion(s.to_string())),
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity of a training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    experiment_name: String,
    process_kind: ProcessKind,
    version: ModelVersion,
}

impl JobKey {
    /// Build a key from raw components, normalizing the process kind.
    pub fn new(experiment_name: &str, process_kind: &str, version: &str) -> Result<Self, ConsoleError> {
        let process_kind = process_kind.parse()?;
        let version = version.parse()?;
        Self::from_parts(experiment_name, process_kind, version)
    }

    /// Build a key from already typed components.
    pub fn from_parts(
        experiment_name: &str,
        process_kind: ProcessKind,
        version: ModelVersion,
    ) -> Result<Self, ConsoleError> {
        if experiment_name.is_empty() {
            return Err(ConsoleError::EmptyExperimentName);
        }
        Ok(Self {
            experiment_name: experiment_name.to_string(),
            process_kind,
            version,
        })
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn process_kind(&self) -> ProcessKind {
        self.process_kind
    }

    pub fn version(&self) -> ModelVersion {
        self.version
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.experiment_name, self.process_kind, self.version)
    }
}

impl FromStr for JobKey {
    type Err = ConsoleError;

    /// Parses `<experiment>_<process>_<version>`. Splits from the right, so
    /// experiment names may themselves contain underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(version), Some(process), Some(experiment)) => {
                JobKey::new(experiment, process, version)
            }
            _ => Err(ConsoleError::InvalidJobKey(s.to_string())),
        }
    }
}

/// One of the two output streams of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stdout,
    Stderr,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Stdout, Channel::Stderr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }

    /// The other channel.
    pub fn toggled(&self) -> Channel {
        match self {
            Channel::Stdout => Channel::Stderr,
            Channel::Stderr => Channel::Stdout,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status as seen by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Starting,
    Running,
    ErrorStarting,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::ErrorStarting => write!(f, "error starting"),
        }
    }
}

/// Server-side log file locations reported by the launcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRefs {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Everything needed to register a job after a successful start.
///
/// Key components are kept raw here; they are validated and normalized by
/// [`JobRegistry::register_job`](crate::state::JobRegistry::register_job).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStart {
    pub experiment_name: String,
    pub process_type: String,
    pub version: String,
    pub process_id: Option<u32>,
    pub log_refs: Option<LogRefs>,
}

impl JobStart {
    pub fn new(experiment_name: &str, process_type: &str, version: &str) -> Self {
        Self {
            experiment_name: experiment_name.to_string(),
            process_type: process_type.to_string(),
            version: version.to_string(),
            process_id: None,
            log_refs: None,
        }
    }

    pub fn with_process_id(mut self, process_id: u32) -> Self {
        self.process_id = Some(process_id);
        self
    }

    pub fn with_log_refs(mut self, log_refs: LogRefs) -> Self {
        self.log_refs = Some(log_refs);
        self
    }

    /// Validated, canonical key for this start.
    pub fn key(&self) -> Result<JobKey, ConsoleError> {
        JobKey::new(&self.experiment_name, &self.process_type, &self.version)
    }
}

/// A training job tracked by the console.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub key: JobKey,
    pub process_id: Option<u32>,
    pub status: JobStatus,
    pub log_refs: Option<LogRefs>,
    /// Monotonic start time, used for ordering.
    pub started_at: Instant,
    /// Wall-clock start time, used for display.
    pub started_wall: DateTime<Utc>,
}

impl ActiveJob {
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_wall
    }
}
