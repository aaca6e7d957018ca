//! Console state.
//!
//! Jobs and their logs live in [`JobRegistry`] and [`LogStore`]. [`AppState`]
//! is the snapshot the UI renders from, refreshed from those each frame, plus
//! the bits of view state that only the UI cares about.

mod job;
mod log;
mod registry;
mod weights;

pub use job::{ActiveJob, Channel, JobKey, JobStart, JobStatus, LogRefs, ModelVersion, ProcessKind};
pub use log::{FetchLease, LogPage, LogState, LogStore, LogTail};
pub use registry::JobRegistry;
pub use weights::WeightCatalog;

use std::fmt;
use std::time::Duration;

/// Log rows snapshotted before the terminal size is known.
pub const DEFAULT_VIEWPORT_ROWS: usize = 200;

/// Reachability of the training service, as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error(_) => write!(f, "error"),
        }
    }
}

/// What the UI draws.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tracked jobs, newest first.
    pub jobs: Vec<ActiveJob>,
    /// Highlighted row in the job list.
    pub cursor: Option<usize>,
    /// Job whose logs are being tailed.
    pub selected: Option<JobKey>,
    /// Visible logs of the selected job.
    pub logs: LogTail,
    /// Log tab being viewed.
    pub channel: Channel,
    /// Lines scrolled up from the tail.
    pub log_scroll: usize,
    /// Upper bound on the log rows the screen can show.
    pub viewport_rows: usize,
    pub connection: ConnectionStatus,
    /// Time left before guarded calls are allowed again.
    pub cooldown: Option<Duration>,
    pub status_message: Option<String>,
    pub endpoint: String,
    /// Weights new jobs can start from.
    pub weights: WeightCatalog,
}

impl AppState {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            jobs: Vec::new(),
            cursor: None,
            selected: None,
            logs: LogTail::default(),
            channel: Channel::Stdout,
            log_scroll: 0,
            viewport_rows: DEFAULT_VIEWPORT_ROWS,
            connection: ConnectionStatus::default(),
            cooldown: None,
            status_message: None,
            endpoint: endpoint.into(),
            weights: WeightCatalog::default(),
        }
    }

    /// Replace the job list, keeping the cursor on the same job if it survived.
    pub fn set_jobs(&mut self, jobs: Vec<ActiveJob>) {
        let highlighted = self.cursor_job().map(|job| job.key.clone());
        self.jobs = jobs;
        self.cursor = match highlighted {
            Some(key) => self
                .jobs
                .iter()
                .position(|job| job.key == key)
                .or_else(|| self.cursor.map(|i| i.min(self.jobs.len().saturating_sub(1)))),
            None => (!self.jobs.is_empty()).then_some(0),
        };
        if self.jobs.is_empty() {
            self.cursor = None;
        }
    }

    /// Job under the cursor.
    pub fn cursor_job(&self) -> Option<&ActiveJob> {
        self.cursor.and_then(|i| self.jobs.get(i))
    }

    /// Move the cursor down, wrapping to the top.
    pub fn select_next(&mut self) {
        if self.jobs.is_empty() {
            self.cursor = None;
            return;
        }
        self.cursor = Some(match self.cursor {
            Some(i) if i + 1 < self.jobs.len() => i + 1,
            _ => 0,
        });
    }

    /// Move the cursor up, wrapping to the bottom.
    pub fn select_prev(&mut self) {
        if self.jobs.is_empty() {
            self.cursor = None;
            return;
        }
        self.cursor = Some(match self.cursor {
            Some(i) if i > 0 => i - 1,
            _ => self.jobs.len() - 1,
        });
    }

    pub fn toggle_channel(&mut self) {
        self.channel = self.channel.toggled();
        self.log_scroll = 0;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let max = self.logs.len(self.channel);
        self.log_scroll = (self.log_scroll + lines).min(max);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Running jobs among the tracked ones.
    pub fn running_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Running)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn job(name: &str) -> ActiveJob {
        ActiveJob {
            key: JobKey::new(name, "gpt", "v2").unwrap(),
            process_id: None,
            status: JobStatus::Running,
            log_refs: None,
            started_at: tokio::time::Instant::now(),
            started_wall: Utc::now(),
        }
    }

    #[test]
    fn cursor_wraps_both_ways() {
        let mut state = AppState::new("http://localhost:6006");
        state.set_jobs(vec![job("a"), job("b"), job("c")]);
        assert_eq!(state.cursor, Some(0));

        state.select_prev();
        assert_eq!(state.cursor, Some(2));
        state.select_next();
        assert_eq!(state.cursor, Some(0));
        state.select_next();
        assert_eq!(state.cursor_job().unwrap().key.experiment_name(), "b");
    }

    #[test]
    fn cursor_follows_job_across_refresh() {
        let mut state = AppState::new("http://localhost:6006");
        state.set_jobs(vec![job("a"), job("b")]);
        state.select_next();

        state.set_jobs(vec![job("new"), job("a"), job("b")]);
        assert_eq!(state.cursor_job().unwrap().key.experiment_name(), "b");
    }

    #[test]
    fn cursor_clamps_when_highlighted_job_disappears() {
        let mut state = AppState::new("http://localhost:6006");
        state.set_jobs(vec![job("a"), job("b")]);
        state.select_next();

        state.set_jobs(vec![job("a")]);
        assert_eq!(state.cursor, Some(0));

        state.set_jobs(Vec::new());
        assert_eq!(state.cursor, None);
        state.select_next();
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn scrolling_is_bounded_by_buffer() {
        let mut state = AppState::new("http://localhost:6006");
        state.logs.stdout_len = 3;
        state.scroll_up(10);
        assert_eq!(state.log_scroll, 3);
        state.scroll_down(1);
        assert_eq!(state.log_scroll, 2);

        state.toggle_channel();
        assert_eq!(state.channel, Channel::Stderr);
        assert_eq!(state.log_scroll, 0);
    }
}
