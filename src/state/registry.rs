//! The set of training jobs the console is tracking.

use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;
use tokio::time::Instant;
use tracing::info;

use crate::error::ConsoleError;
use crate::monitor::Poller;
use crate::state::{ActiveJob, JobKey, JobStart, JobStatus, LogStore};

/// Owns every [`ActiveJob`]; registration and removal cascade into the
/// [`LogStore`] and the [`Poller`].
pub struct JobRegistry {
    jobs: HashMap<JobKey, Tracked>,
    store: LogStore,
    poller: Poller,
    next_seq: u64,
}

struct Tracked {
    job: ActiveJob,
    /// Registration order, breaks ties between equal start instants.
    seq: u64,
}

impl JobRegistry {
    pub fn new(store: LogStore, poller: Poller) -> Self {
        Self {
            jobs: HashMap::new(),
            store,
            poller,
            next_seq: 0,
        }
    }

    /// Track a job whose start the launcher reported as successful.
    ///
    /// The key is validated before anything is touched. Registering a key
    /// that is already tracked replaces the job record but keeps the log
    /// buffers, since they read the same server-side logs.
    pub fn register_job(&mut self, start: JobStart) -> Result<ActiveJob, ConsoleError> {
        let key = start.key()?;
        let job = ActiveJob {
            key: key.clone(),
            process_id: start.process_id,
            status: JobStatus::Running,
            log_refs: start.log_refs,
            started_at: Instant::now(),
            started_wall: Utc::now(),
        };

        self.store.ensure(&key);
        self.next_seq += 1;
        let replaced = self
            .jobs
            .insert(
                key.clone(),
                Tracked {
                    job: job.clone(),
                    seq: self.next_seq,
                },
            )
            .is_some();

        info!(job = %key, pid = ?job.process_id, replaced, "registered training job");
        Ok(job)
    }

    /// Stop tracking `key`. Deselects it first if it is being polled, then
    /// purges its logs.
    pub fn remove_job(&mut self, key: &JobKey) -> Option<ActiveJob> {
        if self.poller.selected().as_ref() == Some(key) {
            self.poller.deselect();
        }
        self.store.purge(key);

        let removed = self.jobs.remove(key).map(|tracked| tracked.job);
        if removed.is_some() {
            info!(job = %key, "removed training job");
        }
        removed
    }

    /// All tracked jobs, most recently started first.
    pub fn list_jobs(&self) -> Vec<ActiveJob> {
        self.jobs
            .values()
            .sorted_by(|a, b| (b.job.started_at, b.seq).cmp(&(a.job.started_at, a.seq)))
            .map(|tracked| tracked.job.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
