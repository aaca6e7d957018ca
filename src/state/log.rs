//! Accumulated job output.
//!
//! The store keeps one append-only buffer and one cursor per job channel.
//! Writers are the fetch that currently holds a channel's single-flight slot,
//! job registration and purge. Readers get cloned snapshots: the whole job
//! through [`LogStore::get_state`], or just the lines a view can show through
//! [`LogStore::tail`].

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::state::{Channel, JobKey};

/// A page of output returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub lines: Vec<String>,
    pub next_offset: u64,
}

/// Buffer and cursor for one channel of one job.
#[derive(Debug, Clone, Default)]
struct LogStream {
    lines: Vec<String>,
    next_offset: u64,
    is_loading: bool,
    /// Identifies this incarnation of the entry; changes after purge + ensure.
    incarnation: u64,
    /// Lease id of the outstanding fetch, if any.
    lease: Option<u64>,
}

impl LogStream {
    fn apply(&mut self, lines: Vec<String>, reported_next_offset: u64) {
        self.lines.extend(lines);
        self.next_offset = self.next_offset.max(reported_next_offset);
        self.is_loading = false;
        self.lease = None;
    }
}

/// Snapshot of both channels of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogState {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub stdout_next_offset: u64,
    pub stderr_next_offset: u64,
    pub is_loading: bool,
}

/// The visible part of one channel plus the counters of both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTail {
    pub channel: Channel,
    /// At most `rows` lines of `channel`, ending `scroll` lines above its tail.
    pub lines: Vec<String>,
    pub stdout_len: usize,
    pub stderr_len: usize,
    pub stdout_next_offset: u64,
    pub stderr_next_offset: u64,
    pub is_loading: bool,
}

impl LogTail {
    /// Buffered line count of `channel`.
    pub fn len(&self, channel: Channel) -> usize {
        match channel {
            Channel::Stdout => self.stdout_len,
            Channel::Stderr => self.stderr_len,
        }
    }

    pub fn next_offset(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Stdout => self.stdout_next_offset,
            Channel::Stderr => self.stderr_next_offset,
        }
    }
}

/// Lines to show for a buffer of `len` lines in a view `rows` tall,
/// scrolled `scroll` lines up from the tail.
fn visible_window(len: usize, rows: usize, scroll: usize) -> Range<usize> {
    let end = len.saturating_sub(scroll);
    let start = end.saturating_sub(rows);
    start..end
}

/// Permission to run the one outstanding fetch for a channel.
///
/// Completing through a lease only touches the entry the lease was issued for;
/// if the job was purged (and perhaps registered again) in between, the
/// completion is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLease {
    pub key: JobKey,
    pub channel: Channel,
    /// Offset to request.
    pub offset: u64,
    incarnation: u64,
    id: u64,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<(JobKey, Channel), LogStream>,
    next_id: u64,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn leased_stream(&mut self, lease: &FetchLease) -> Option<&mut LogStream> {
        self.streams
            .get_mut(&(lease.key.clone(), lease.channel))
            .filter(|stream| stream.incarnation == lease.incarnation && stream.lease == Some(lease.id))
    }
}

/// Log buffers for all tracked jobs. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    inner: Arc<Mutex<Inner>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create empty entries for both channels of `key` if they do not exist yet.
    pub fn ensure(&self, key: &JobKey) {
        let mut inner = self.lock();
        for channel in Channel::ALL {
            if inner.streams.contains_key(&(key.clone(), channel)) {
                continue;
            }
            let incarnation = inner.next_id();
            inner.streams.insert(
                (key.clone(), channel),
                LogStream {
                    incarnation,
                    ..LogStream::default()
                },
            );
        }
    }

    /// Whether `key` has entries in the store.
    pub fn contains(&self, key: &JobKey) -> bool {
        self.lock().streams.contains_key(&(key.clone(), Channel::Stdout))
    }

    /// Append a fetched page and advance the cursor, never backwards.
    ///
    /// Returns `false` when there is no entry for `key` (the job was removed
    /// while the fetch was in flight); the result is discarded.
    pub fn append_result(
        &self,
        key: &JobKey,
        channel: Channel,
        lines: Vec<String>,
        reported_next_offset: u64,
    ) -> bool {
        let mut inner = self.lock();
        match inner.streams.get_mut(&(key.clone(), channel)) {
            Some(stream) => {
                stream.apply(lines, reported_next_offset);
                true
            }
            None => {
                trace!(job = %key, %channel, "discarding log page for removed job");
                false
            }
        }
    }

    /// Single-flight gate: refuses while a fetch for this channel is outstanding.
    pub fn begin_fetch(&self, key: &JobKey, channel: Channel) -> bool {
        self.lease(key, channel).is_some()
    }

    /// Like [`begin_fetch`](Self::begin_fetch), returning the lease to complete with.
    pub fn lease(&self, key: &JobKey, channel: Channel) -> Option<FetchLease> {
        let mut inner = self.lock();
        let id = inner.next_id();
        let stream = inner.streams.get_mut(&(key.clone(), channel))?;
        if stream.is_loading {
            return None;
        }
        stream.is_loading = true;
        stream.lease = Some(id);
        Some(FetchLease {
            key: key.clone(),
            channel,
            offset: stream.next_offset,
            incarnation: stream.incarnation,
            id,
        })
    }

    /// Apply a page fetched under `lease`. Stale leases are ignored.
    pub fn apply_page(&self, lease: &FetchLease, page: LogPage) -> bool {
        let mut inner = self.lock();
        match inner.leased_stream(lease) {
            Some(stream) => {
                stream.apply(page.lines, page.next_offset);
                true
            }
            None => {
                trace!(job = %lease.key, channel = %lease.channel, "discarding stale log page");
                false
            }
        }
    }

    /// Give up the single-flight slot after a failed fetch; the cursor stays put.
    pub fn release(&self, lease: &FetchLease) {
        let mut inner = self.lock();
        if let Some(stream) = inner.leased_stream(lease) {
            stream.is_loading = false;
            stream.lease = None;
        }
    }

    /// Snapshot of both channels; the zeroed default for unknown keys.
    pub fn get_state(&self, key: &JobKey) -> LogState {
        let inner = self.lock();
        let stdout = inner.streams.get(&(key.clone(), Channel::Stdout));
        let stderr = inner.streams.get(&(key.clone(), Channel::Stderr));
        LogState {
            stdout: stdout.map(|s| s.lines.clone()).unwrap_or_default(),
            stderr: stderr.map(|s| s.lines.clone()).unwrap_or_default(),
            stdout_next_offset: stdout.map_or(0, |s| s.next_offset),
            stderr_next_offset: stderr.map_or(0, |s| s.next_offset),
            is_loading: stdout.is_some_and(|s| s.is_loading) || stderr.is_some_and(|s| s.is_loading),
        }
    }

    /// Copy only the window of `channel` a view `rows` tall shows when scrolled
    /// `scroll` lines up from the tail; zeroed for unknown keys.
    pub fn tail(&self, key: &JobKey, channel: Channel, rows: usize, scroll: usize) -> LogTail {
        let inner = self.lock();
        let stdout = inner.streams.get(&(key.clone(), Channel::Stdout));
        let stderr = inner.streams.get(&(key.clone(), Channel::Stderr));
        let lines = inner
            .streams
            .get(&(key.clone(), channel))
            .map(|s| s.lines[visible_window(s.lines.len(), rows, scroll)].to_vec())
            .unwrap_or_default();
        LogTail {
            channel,
            lines,
            stdout_len: stdout.map_or(0, |s| s.lines.len()),
            stderr_len: stderr.map_or(0, |s| s.lines.len()),
            stdout_next_offset: stdout.map_or(0, |s| s.next_offset),
            stderr_next_offset: stderr.map_or(0, |s| s.next_offset),
            is_loading: stdout.is_some_and(|s| s.is_loading) || stderr.is_some_and(|s| s.is_loading),
        }
    }

    /// Whether the channel has no lines yet (or no entry at all).
    pub fn is_empty(&self, key: &JobKey, channel: Channel) -> bool {
        self.lock()
            .streams
            .get(&(key.clone(), channel))
            .map_or(true, |s| s.lines.is_empty())
    }

    /// Drop both channels of `key`. Idempotent.
    pub fn purge(&self, key: &JobKey) {
        let mut inner = self.lock();
        for channel in Channel::ALL {
            inner.streams.remove(&(key.clone(), channel));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn key() -> JobKey {
        JobKey::new("singer1", "sovits", "v2").unwrap()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    fn unknown_key_reads_as_empty_default(key: JobKey) {
        let store = LogStore::new();
        assert_eq!(store.get_state(&key), LogState::default());
    }

    #[rstest]
    fn append_extends_and_advances(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        assert!(store.begin_fetch(&key, Channel::Stdout));
        assert!(store.append_result(&key, Channel::Stdout, lines(&["epoch 1 start"]), 42));
        assert!(store.append_result(&key, Channel::Stdout, lines(&["epoch 1 end"]), 80));

        let state = store.get_state(&key);
        assert_eq!(state.stdout, lines(&["epoch 1 start", "epoch 1 end"]));
        assert_eq!(state.stdout_next_offset, 80);
        assert_eq!(state.stderr_next_offset, 0);
        assert!(!state.is_loading);
    }

    #[rstest]
    #[case(10, 30)]
    #[case(30, 10)]
    fn offset_never_regresses(key: JobKey, #[case] first: u64, #[case] second: u64) {
        let store = LogStore::new();
        store.ensure(&key);
        store.append_result(&key, Channel::Stderr, lines(&["a"]), first);
        let after_first = store.get_state(&key).stderr.len();
        store.append_result(&key, Channel::Stderr, lines(&["b"]), second);

        let state = store.get_state(&key);
        assert_eq!(state.stderr_next_offset, 30);
        assert!(state.stderr.len() >= after_first);
    }

    #[rstest]
    fn begin_fetch_is_single_flight_per_channel(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        assert!(store.begin_fetch(&key, Channel::Stdout));
        assert!(!store.begin_fetch(&key, Channel::Stdout));
        assert!(store.begin_fetch(&key, Channel::Stderr));
        assert!(store.get_state(&key).is_loading);

        store.append_result(&key, Channel::Stdout, Vec::new(), 0);
        assert!(store.begin_fetch(&key, Channel::Stdout));
    }

    #[rstest]
    fn begin_fetch_refuses_unknown_key(key: JobKey) {
        let store = LogStore::new();
        assert!(!store.begin_fetch(&key, Channel::Stdout));
    }

    #[rstest]
    fn append_for_removed_job_is_discarded(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        store.purge(&key);
        assert!(!store.append_result(&key, Channel::Stdout, lines(&["late"]), 10));
        assert_eq!(store.get_state(&key), LogState::default());
    }

    #[rstest]
    fn purge_is_idempotent(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        store.purge(&key);
        store.purge(&key);
        assert!(!store.contains(&key));
    }

    #[rstest]
    fn release_keeps_cursor(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        store.append_result(&key, Channel::Stdout, lines(&["x"]), 12);

        let lease = store.lease(&key, Channel::Stdout).unwrap();
        assert_eq!(lease.offset, 12);
        store.release(&lease);

        let state = store.get_state(&key);
        assert_eq!(state.stdout_next_offset, 12);
        assert!(!state.is_loading);
    }

    #[rstest]
    fn lease_from_previous_incarnation_is_ignored(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        let stale = store.lease(&key, Channel::Stdout).unwrap();

        store.purge(&key);
        store.ensure(&key);
        let fresh = store.lease(&key, Channel::Stdout).unwrap();

        let page = LogPage {
            lines: lines(&["old run"]),
            next_offset: 500,
        };
        assert!(!store.apply_page(&stale, page));
        store.release(&stale);
        assert!(store.get_state(&key).is_loading);

        let page = LogPage {
            lines: lines(&["new run"]),
            next_offset: 9,
        };
        assert!(store.apply_page(&fresh, page));
        let state = store.get_state(&key);
        assert_eq!(state.stdout, lines(&["new run"]));
        assert_eq!(state.stdout_next_offset, 9);
    }

    #[rstest]
    fn tail_copies_only_the_visible_window(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        let page: Vec<String> = (0..1000).map(|i| format!("step {i}")).collect();
        store.append_result(&key, Channel::Stdout, page, 9000);
        store.append_result(&key, Channel::Stderr, lines(&["warn"]), 4);

        let tail = store.tail(&key, Channel::Stdout, 3, 0);
        assert_eq!(tail.lines, lines(&["step 997", "step 998", "step 999"]));
        assert_eq!(tail.len(Channel::Stdout), 1000);
        assert_eq!(tail.len(Channel::Stderr), 1);
        assert_eq!(tail.next_offset(Channel::Stdout), 9000);
        assert_eq!(tail.next_offset(Channel::Stderr), 4);

        let scrolled = store.tail(&key, Channel::Stdout, 2, 10);
        assert_eq!(scrolled.lines, lines(&["step 988", "step 989"]));

        let stderr = store.tail(&key, Channel::Stderr, 50, 0);
        assert_eq!(stderr.channel, Channel::Stderr);
        assert_eq!(stderr.lines, lines(&["warn"]));
    }

    #[rstest]
    fn tail_of_unknown_key_is_empty(key: JobKey) {
        let store = LogStore::new();
        assert_eq!(
            store.tail(&key, Channel::Stderr, 10, 0),
            LogTail {
                channel: Channel::Stderr,
                ..LogTail::default()
            }
        );
    }

    #[rstest]
    #[case(3, 10, 0, 0..3)]
    #[case(100, 10, 0, 90..100)]
    #[case(100, 10, 5, 85..95)]
    #[case(100, 10, 200, 0..0)]
    fn window_follows_the_tail(
        #[case] len: usize,
        #[case] rows: usize,
        #[case] scroll: usize,
        #[case] expected: Range<usize>,
    ) {
        assert_eq!(visible_window(len, rows, scroll), expected);
    }

    #[rstest]
    fn ensure_keeps_existing_buffers(key: JobKey) {
        let store = LogStore::new();
        store.ensure(&key);
        store.append_result(&key, Channel::Stdout, lines(&["kept"]), 5);
        store.ensure(&key);
        assert_eq!(store.get_state(&key).stdout, lines(&["kept"]));
    }
}
