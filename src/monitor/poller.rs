//! Log tailing for the selected job.
//!
//! The poller owns a single [`PollSession`]: the job being viewed and the one
//! recurring timer that pulls its stdout and stderr. Changing the selection
//! cancels the old timer before a new one exists, and every tick reads the
//! selection and cursors as they are when it fires.
//!
//! Fetches run in their own tasks. They are not cancelled with the timer;
//! whatever they bring back is written under the key they were issued for,
//! through the [`FetchLease`] the store handed out.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{CooldownGuard, OperationClass, DEFAULT_LOG_POLL_INTERVAL};
use crate::client::{FetchClient, LogRequest, DEFAULT_MAX_LINES};
use crate::state::{Channel, FetchLease, JobKey, LogStore};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_lines: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_LOG_POLL_INTERVAL,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// What the poller is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling(JobKey),
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::Polling(key) => write!(f, "polling {key}"),
        }
    }
}

struct PollTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollTimer {
    fn cancel(self) {
        self.token.cancel();
        self.task.abort();
    }
}

#[derive(Default)]
struct PollSession {
    selected: Option<JobKey>,
    timer: Option<PollTimer>,
    /// Bumped on every transition; a tick from an older generation is inert.
    generation: u64,
}

impl PollSession {
    fn stop(&mut self) {
        self.generation += 1;
        self.selected = None;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

struct Shared {
    client: Arc<dyn FetchClient>,
    store: LogStore,
    guard: Arc<CooldownGuard>,
    config: PollerConfig,
    session: Mutex<PollSession>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, PollSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_tick(&self, generation: u64) {
        let session = self.session();
        if session.generation != generation {
            trace!(generation, "ignoring tick from a cancelled timer");
            return;
        }
        let Some(key) = session.selected.as_ref() else {
            return;
        };
        for channel in Channel::ALL {
            self.issue(key, channel);
        }
    }

    /// Start a fetch for one channel unless the guard is cooling down or a
    /// fetch for that channel is still outstanding.
    fn issue(&self, key: &JobKey, channel: Channel) -> bool {
        if let Err(err) = self.guard.check(OperationClass::LogFetch) {
            debug!(job = %key, %channel, %err, "skipping log fetch");
            return false;
        }
        let Some(lease) = self.store.lease(key, channel) else {
            trace!(job = %key, %channel, "previous fetch still outstanding");
            return false;
        };

        let request = LogRequest::new(key, channel, lease.offset, self.config.max_lines);
        tokio::spawn(run_fetch(
            Arc::clone(&self.client),
            self.store.clone(),
            Arc::clone(&self.guard),
            lease,
            request,
        ));
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

async fn run_fetch(
    client: Arc<dyn FetchClient>,
    store: LogStore,
    guard: Arc<CooldownGuard>,
    lease: FetchLease,
    request: LogRequest,
) {
    debug!(job = %lease.key, channel = %lease.channel, offset = lease.offset, "fetching logs");
    match client.fetch_logs(&request).await {
        Ok(page) => {
            guard.record_success(OperationClass::LogFetch);
            let received = page.lines.len();
            let next_offset = page.next_offset;
            if store.apply_page(&lease, page) {
                debug!(job = %lease.key, channel = %lease.channel, received, next_offset, "log page applied");
            }
        }
        Err(err) => {
            guard.record_failure(OperationClass::LogFetch);
            store.release(&lease);
            warn!(job = %lease.key, channel = %lease.channel, offset = lease.offset, error = %err, "log fetch failed");
        }
    }
}

/// Keeps one polling session bound to the selected job. Cheap to clone;
/// clones control the same session. The timer is cancelled when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Poller {
    shared: Arc<Shared>,
}

impl Poller {
    pub fn new(
        client: Arc<dyn FetchClient>,
        store: LogStore,
        guard: Arc<CooldownGuard>,
        config: PollerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                store,
                guard,
                config,
                session: Mutex::new(PollSession::default()),
            }),
        }
    }

    /// Start polling `key`, replacing any other selection.
    ///
    /// Selecting the key that is already being polled does nothing. Must be
    /// called from within a tokio runtime.
    pub fn select(&self, key: JobKey) {
        let mut session = self.shared.session();
        if session.selected.as_ref() == Some(&key) && session.timer.is_some() {
            return;
        }

        session.stop();
        session.selected = Some(key.clone());
        let generation = session.generation;

        if self.shared.store.is_empty(&key, Channel::Stdout) {
            self.shared.issue(&key, Channel::Stdout);
        }
        session.timer = Some(self.spawn_timer(generation));
        debug!(job = %key, generation, "log polling started");
    }

    /// Stop polling. Returns once the timer can no longer fire.
    pub fn deselect(&self) {
        let mut session = self.shared.session();
        if let Some(key) = session.selected.take() {
            debug!(job = %key, "log polling stopped");
        }
        session.stop();
    }

    pub fn selected(&self) -> Option<JobKey> {
        self.shared.session().selected.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.session().timer.is_some()
    }

    pub fn state(&self) -> PollState {
        let session = self.shared.session();
        match (&session.selected, &session.timer) {
            (Some(key), Some(_)) => PollState::Polling(key.clone()),
            _ => PollState::Idle,
        }
    }

    fn spawn_timer(&self, generation: u64) -> PollTimer {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let period = self.shared.config.interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = shared.upgrade() else { break };
                        shared.on_tick(generation);
                    }
                }
            }
        });

        PollTimer { token, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use crate::monitor::testing::ScriptedClient;
    use crate::state::{LogPage, LogState};
    use pretty_assertions::assert_eq;

    const TICK: Duration = Duration::from_secs(5);

    struct Fixture {
        client: Arc<ScriptedClient>,
        store: LogStore,
        guard: Arc<CooldownGuard>,
        poller: Poller,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(ScriptedClient::default());
        let store = LogStore::new();
        let guard = Arc::new(CooldownGuard::default());
        let poller = Poller::new(client.clone(), store.clone(), guard.clone(), PollerConfig::default());
        Fixture {
            client,
            store,
            guard,
            poller,
        }
    }

    fn key(name: &str) -> JobKey {
        JobKey::new(name, "sovits", "v2").unwrap()
    }

    fn page(lines: &[&str], next_offset: u64) -> Result<LogPage, ConsoleError> {
        Ok(LogPage {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            next_offset,
        })
    }

    async fn tick(client: &ScriptedClient) {
        time::advance(TICK).await;
        client.settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn select_fetches_stdout_immediately_and_applies_page() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);

        fx.poller.select(singer.clone());
        fx.client.settle().await;

        let requests = fx.client.requests();
        assert_eq!(requests, vec![LogRequest::new(&singer, Channel::Stdout, 0, 100)]);

        fx.client.respond(0, page(&["epoch 1 start"], 42));
        fx.client.settle().await;

        let state = fx.store.get_state(&singer);
        assert_eq!(state.stdout, vec!["epoch 1 start".to_string()]);
        assert_eq!(state.stdout_next_offset, 42);
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn select_skips_immediate_fetch_when_stdout_has_lines() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.store.append_result(&singer, Channel::Stdout, vec!["old".into()], 3);

        fx.poller.select(singer);
        fx.client.settle().await;
        assert_eq!(fx.client.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_reads_fresh_offsets_for_both_channels() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.poller.select(singer.clone());
        fx.client.settle().await;
        fx.client.respond(0, page(&["a", "b"], 42));
        fx.client.settle().await;

        tick(&fx.client).await;
        let requests = fx.client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1], LogRequest::new(&singer, Channel::Stdout, 42, 100));
        assert_eq!(requests[2], LogRequest::new(&singer, Channel::Stderr, 0, 100));
    }

    #[tokio::test(start_paused = true)]
    async fn outstanding_channel_is_skipped_then_retried_from_same_offset() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.poller.select(singer.clone());
        fx.client.settle().await;

        // Immediate stdout fetch is still outstanding: only stderr goes out.
        tick(&fx.client).await;
        let requests = fx.client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].log_type, Channel::Stderr);

        fx.client.respond(1, page(&[], 0));
        fx.client.settle().await;
        tick(&fx.client).await;
        let requests = fx.client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2], LogRequest::new(&singer, Channel::Stderr, 0, 100));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_releases_channel_without_advancing() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.poller.select(singer.clone());
        fx.client.settle().await;

        fx.client.respond(0, Err(ConsoleError::Connectivity("connection refused".into())));
        fx.client.settle().await;
        assert_eq!(fx.store.get_state(&singer), LogState::default());
        assert_eq!(fx.guard.consecutive_failures(), 1);
        assert!(fx.poller.is_polling());

        tick(&fx.client).await;
        let stdout: Vec<_> = fx
            .client
            .requests()
            .into_iter()
            .filter(|req| req.log_type == Channel::Stdout)
            .collect();
        assert_eq!(stdout.len(), 2);
        assert_eq!(stdout[1].offset, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_the_same_key_is_a_no_op() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.poller.select(singer.clone());
        fx.client.settle().await;
        fx.client.respond(0, page(&[], 0));
        fx.client.settle().await;

        fx.poller.select(singer.clone());
        fx.client.settle().await;
        // Stdout is still empty, but a no-op select issues nothing.
        assert_eq!(fx.client.request_count(), 1);
        assert_eq!(fx.poller.state(), PollState::Polling(singer));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reselection_leaves_exactly_one_timer() {
        let fx = fixture();
        let (a, b) = (key("a"), key("b"));
        fx.store.ensure(&a);
        fx.store.ensure(&b);

        fx.poller.select(a.clone());
        fx.poller.select(b.clone());
        fx.poller.select(a.clone());
        assert_eq!(fx.poller.state(), PollState::Polling(a.clone()));
        fx.client.settle().await;

        // Immediate stdout fetches for a and b; the second select of a finds
        // a's stdout fetch still outstanding.
        let immediate: Vec<_> = fx.client.requests().iter().map(|r| r.experiment_name.clone()).collect();
        assert_eq!(immediate, vec!["a", "b"]);

        for i in 0..2 {
            fx.client.respond(i, page(&[], 0));
        }
        fx.client.settle().await;

        tick(&fx.client).await;
        let ticked: Vec<_> = fx.client.requests()[2..]
            .iter()
            .map(|r| (r.experiment_name.clone(), r.log_type))
            .collect();
        assert_eq!(
            ticked,
            vec![("a".to_string(), Channel::Stdout), ("a".to_string(), Channel::Stderr)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn background_results_land_on_their_own_job() {
        let fx = fixture();
        let (a, b) = (key("a"), key("b"));
        fx.store.ensure(&a);
        fx.store.ensure(&b);

        fx.poller.select(a.clone());
        fx.client.settle().await;
        fx.poller.select(b.clone());
        fx.client.settle().await;

        // a's fetch resolves while b is being viewed.
        fx.client.respond(0, page(&["a line"], 7));
        fx.client.respond(1, page(&["b line"], 9));
        fx.client.settle().await;

        assert_eq!(fx.store.get_state(&a).stdout, vec!["a line".to_string()]);
        assert_eq!(fx.store.get_state(&a).stdout_next_offset, 7);
        assert_eq!(fx.store.get_state(&b).stdout, vec!["b line".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn deselect_stops_ticks() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.poller.select(singer);
        fx.client.settle().await;
        fx.client.respond(0, page(&["x"], 1));
        fx.client.settle().await;

        fx.poller.deselect();
        assert_eq!(fx.poller.state(), PollState::Idle);
        tick(&fx.client).await;
        tick(&fx.client).await;
        assert_eq!(fx.client.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_cancels_the_timer() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.store.append_result(&singer, Channel::Stdout, vec!["x".into()], 1);
        fx.poller.select(singer);

        drop(fx.poller);
        tick(&fx.client).await;
        assert_eq!(fx.client.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_suppresses_ticks_until_window_closes() {
        let fx = fixture();
        let singer = key("singer1");
        fx.store.ensure(&singer);
        fx.store.append_result(&singer, Channel::Stdout, vec!["x".into()], 1);
        for _ in 0..3 {
            fx.guard.record_failure(OperationClass::Probe);
        }

        fx.poller.select(singer);
        tick(&fx.client).await;
        tick(&fx.client).await;
        assert_eq!(fx.client.request_count(), 0);

        // Window opened at t=0 and lasts 15s.
        tick(&fx.client).await;
        assert_eq!(fx.client.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_unregistered_key_fetches_nothing() {
        let fx = fixture();
        fx.poller.select(key("ghost"));
        tick(&fx.client).await;
        assert_eq!(fx.client.request_count(), 0);
        assert!(fx.poller.is_polling());
    }
}
