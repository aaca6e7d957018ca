//! gsv-console - terminal console for GPT-SoVITS training
//!
//! Starts training jobs on a remote service and tails their logs.

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use gsv_console::app::{App, AppConfig};
use gsv_console::client::http::DEFAULT_API_ENDPOINT;
use gsv_console::client::{GptTrainingRequest, HttpFetchClient, SovitsTrainingRequest, TrainingRequest, DEFAULT_MAX_LINES};
use gsv_console::event::EventHandler;
use gsv_console::logging;
use gsv_console::state::ModelVersion;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gsv-console", version, about = "Start GPT-SoVITS training jobs and tail their logs")]
struct Args {
    /// Base URL of the training service
    #[arg(long, env = "GSV_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    api_endpoint: String,

    /// Seconds between log polls of the selected job
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Lines requested per log fetch
    #[arg(long, default_value_t = DEFAULT_MAX_LINES)]
    max_lines: u32,

    /// Seconds calls are suppressed after repeated failures
    #[arg(long, default_value_t = 15)]
    cooldown: u64,

    /// Consecutive failures that trigger a cooldown
    #[arg(long, default_value_t = 3)]
    failure_threshold: u32,

    /// UI refresh tick in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_rate_ms: u64,

    /// Where diagnostics are written
    #[arg(long, env = "GSV_LOG_FILE", default_value = "gsv-console.log")]
    log_file: PathBuf,

    /// Start SoVITS training for this experiment
    #[arg(long, value_name = "NAME")]
    sovits: Option<String>,

    /// Start GPT training for this experiment
    #[arg(long, value_name = "NAME")]
    gpt: Option<String>,

    /// Model version for jobs started from the command line
    #[arg(long, default_value = "v2")]
    model_version: ModelVersion,

    /// Pretrained SoVITS generator
    #[arg(long)]
    pretrained_s2g: Option<String>,

    /// Pretrained SoVITS discriminator
    #[arg(long)]
    pretrained_s2d: Option<String>,

    /// Pretrained GPT weights
    #[arg(long)]
    pretrained_s1: Option<String>,
}

impl Args {
    fn config(&self) -> AppConfig {
        AppConfig {
            api_endpoint: self.api_endpoint.clone(),
            log_poll_interval: Duration::from_secs(self.poll_interval),
            max_lines: self.max_lines,
            cooldown: Duration::from_secs(self.cooldown),
            failure_threshold: self.failure_threshold,
            tick_rate_ms: self.tick_rate_ms,
            log_file: self.log_file.clone(),
        }
    }

    fn training_requests(&self) -> Vec<TrainingRequest> {
        let mut requests = Vec::new();
        if let Some(name) = &self.sovits {
            let mut request = SovitsTrainingRequest::new(name);
            request.version = self.model_version;
            if let Some(path) = &self.pretrained_s2g {
                request.pretrained_s2g = path.clone();
            }
            if let Some(path) = &self.pretrained_s2d {
                request.pretrained_s2d = path.clone();
            }
            requests.push(TrainingRequest::Sovits(request));
        }
        if let Some(name) = &self.gpt {
            let mut request = GptTrainingRequest::new(name);
            request.version = self.model_version;
            if let Some(path) = &self.pretrained_s1 {
                request.pretrained_s1 = path.clone();
            }
            requests.push(TrainingRequest::Gpt(request));
        }
        requests
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = args.config();
    logging::init(&config.log_file)?;
    info!(endpoint = %config.api_endpoint, "starting gsv-console");

    let client = Arc::new(
        HttpFetchClient::new(config.api_endpoint.clone()).wrap_err("failed to build the HTTP client")?,
    );
    let mut events = EventHandler::new(config.tick_rate());
    let mut app = App::new(config, client);
    for request in args.training_requests() {
        app.launch(request);
    }

    let mut terminal = setup_terminal()?;
    let result = app.run(&mut terminal, &mut events).await;
    restore_terminal(&mut terminal)?;

    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    crossterm::execute!(io::stdout(), EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stdout()))?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
