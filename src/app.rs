//! Application state and logic.
//!
//! [`App`] wires the job registry, log store, poller and launcher together
//! and runs the draw/input loop. Service calls started from the UI run on
//! their own tasks and report back through an internal channel, so the loop
//! never waits on the network.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{http::DEFAULT_API_ENDPOINT, FetchClient, TrainingRequest, DEFAULT_MAX_LINES};
use crate::error::ConsoleError;
use crate::event::{Event, EventHandler};
use crate::monitor::{
    CooldownGuard, Launcher, Poller, PollerConfig, DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_LOG_POLL_INTERVAL,
};
use crate::state::{AppState, ConnectionStatus, JobRegistry, JobStart, LogStore, LogTail, ProcessKind};
use crate::ui::{Ui, UpdateKind};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL of the training service.
    pub api_endpoint: String,
    pub log_poll_interval: Duration,
    /// Lines requested per log fetch.
    pub max_lines: u32,
    pub cooldown: Duration,
    pub failure_threshold: u32,
    pub tick_rate_ms: u64,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            log_poll_interval: DEFAULT_LOG_POLL_INTERVAL,
            max_lines: DEFAULT_MAX_LINES,
            cooldown: DEFAULT_COOLDOWN,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            tick_rate_ms: 250,
            log_file: PathBuf::from("gsv-console.log"),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.log_poll_interval,
            max_lines: self.max_lines,
        }
    }
}

/// Results of background service calls.
#[derive(Debug)]
enum AppMessage {
    Launched {
        request: TrainingRequest,
        result: Result<JobStart, ConsoleError>,
    },
    Probed(Result<(), ConsoleError>),
    Weights {
        kind: ProcessKind,
        result: Result<Vec<String>, ConsoleError>,
    },
}

/// Main application.
pub struct App {
    state: AppState,
    registry: JobRegistry,
    store: LogStore,
    poller: Poller,
    launcher: Launcher,
    guard: Arc<CooldownGuard>,
    ui: Ui,
    tx: mpsc::UnboundedSender<AppMessage>,
    rx: mpsc::UnboundedReceiver<AppMessage>,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, client: Arc<dyn FetchClient>) -> Self {
        let store = LogStore::new();
        let guard = Arc::new(CooldownGuard::new(config.failure_threshold, config.cooldown));
        let poller = Poller::new(client.clone(), store.clone(), guard.clone(), config.poller_config());
        let registry = JobRegistry::new(store.clone(), poller.clone());
        let launcher = Launcher::new(client, guard.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            state: AppState::new(config.api_endpoint.clone()),
            registry,
            store,
            poller,
            launcher,
            guard,
            ui: Ui::new(),
            tx,
            rx,
            should_quit: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Runs the application main loop until the user quits.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>, events: &mut EventHandler) -> Result<()> {
        self.probe();

        while !self.should_quit {
            self.state.viewport_rows = usize::from(terminal.size()?.height);
            self.refresh();
            terminal.draw(|frame| self.ui.render(frame, &self.state))?;

            tokio::select! {
                Some(event) = events.next() => self.handle_event(event),
                Some(message) = self.rx.recv() => self.handle_message(message),
                else => break,
            }
        }

        self.quit();
        Ok(())
    }

    /// Start a training job in the background. Once it is up it is
    /// registered and its logs are tailed.
    pub fn launch(&mut self, request: TrainingRequest) {
        self.state.set_status(format!(
            "starting {} training for {}",
            request.process_kind().label(),
            request.experiment_name()
        ));

        let launcher = self.launcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = launcher.launch(&request).await;
            let _ = tx.send(AppMessage::Launched { request, result });
        });
    }

    /// Check the service connection in the background.
    pub fn probe(&mut self) {
        self.state.connection = ConnectionStatus::Connecting;

        let launcher = self.launcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = launcher.probe().await;
            let _ = tx.send(AppMessage::Probed(result));
        });
    }

    /// List the trained weights of both kinds in the background.
    fn list_weights(&self) {
        let launcher = self.launcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            for kind in [ProcessKind::Sovits, ProcessKind::Gpt] {
                let result = launcher.list_weights(kind).await;
                if tx.send(AppMessage::Weights { kind, result }).is_err() {
                    break;
                }
            }
        });
    }

    /// Copy the current job list, selection and visible logs into the UI
    /// snapshot.
    fn refresh(&mut self) {
        self.state.set_jobs(self.registry.list_jobs());
        self.state.selected = self.poller.selected();
        let channel = self.state.channel;
        self.state.logs = match &self.state.selected {
            Some(key) => self
                .store
                .tail(key, channel, self.state.viewport_rows, self.state.log_scroll),
            None => LogTail {
                channel,
                ..LogTail::default()
            },
        };
        self.state.cooldown = self.guard.remaining();
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                let update = self.ui.handle_key_event(key, &mut self.state);
                self.handle_update(update);
            }
            Event::Resize(width, height) => debug!(width, height, "terminal resized"),
            Event::Tick => self.ui.update_animations(),
        }
    }

    fn handle_update(&mut self, update: UpdateKind) {
        match update {
            UpdateKind::Quit => self.quit(),
            UpdateKind::ToggleHelp => self.ui.toggle_help(),
            UpdateKind::Select(key) => {
                self.state.log_scroll = 0;
                self.poller.select(key);
            }
            UpdateKind::Deselect => self.poller.deselect(),
            UpdateKind::Remove(key) => {
                if self.registry.remove_job(&key).is_some() {
                    self.state.set_status(format!("stopped tracking {key}"));
                }
            }
            UpdateKind::Probe => self.probe(),
            UpdateKind::Launch(request) => self.launch(request),
            UpdateKind::Other => {}
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Launched { request, result } => self.on_launched(&request, result),
            AppMessage::Probed(Ok(())) => {
                self.state.connection = ConnectionStatus::Connected;
                self.list_weights();
            }
            AppMessage::Probed(Err(err)) => {
                warn!(error = %err, "service probe failed");
                match err {
                    ConsoleError::CoolingDown { .. } => {
                        self.state.connection = ConnectionStatus::Disconnected;
                        self.state.set_status(err.to_string());
                    }
                    err => self.state.connection = ConnectionStatus::Error(err.to_string()),
                }
            }
            AppMessage::Weights { kind, result: Ok(paths) } => self.state.weights.set(kind, paths),
            AppMessage::Weights { kind, result: Err(err) } => {
                self.state
                    .set_status(format!("could not list {} weights: {err}", kind.label()));
            }
        }
    }

    fn on_launched(&mut self, request: &TrainingRequest, result: Result<JobStart, ConsoleError>) {
        let label = request.process_kind().label();
        let registered = result.and_then(|start| self.registry.register_job(start));
        match registered {
            Ok(job) => {
                self.state.connection = ConnectionStatus::Connected;
                self.state
                    .set_status(format!("{label} training started for {}", job.key.experiment_name()));
                self.poller.select(job.key);
            }
            Err(err) => {
                if matches!(err, ConsoleError::Connectivity(_)) {
                    self.state.connection = ConnectionStatus::Error(err.to_string());
                }
                self.state.set_status(format!(
                    "{label} training for {} failed: {err}",
                    request.experiment_name()
                ));
            }
        }
    }

    fn quit(&mut self) {
        if !self.should_quit {
            info!(tracked = self.registry.len(), "shutting down");
        }
        self.should_quit = true;
        self.poller.deselect();
    }

    /// Apply every background result that has arrived.
    #[cfg(test)]
    fn drain_messages(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
    }
}
