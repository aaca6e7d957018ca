//! UI components.
//!
//! The screen is a job list next to a log tail, framed by a header and a
//! status line. [`Ui`] turns key presses into [`UpdateKind`]s for the app
//! and draws an [`AppState`] snapshot.

pub mod help;
pub mod job_list;
pub mod launch;
pub mod log_view;
pub mod theme;

pub use help::HelpView;
pub use job_list::JobListView;
pub use launch::{FormAction, LaunchForm, LaunchView};
pub use log_view::LogView;
pub use theme::Theme;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::client::TrainingRequest;
use crate::error::remaining_secs;
use crate::state::{AppState, ConnectionStatus, JobKey, ModelVersion, ProcessKind};

const PAGE: usize = 10;

/// What the app should do in response to user input.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Quit,
    ToggleHelp,
    /// Start tailing this job.
    Select(JobKey),
    /// Stop tailing.
    Deselect,
    /// Stop tracking this job.
    Remove(JobKey),
    /// Check the connection to the service.
    Probe,
    /// Start a training job.
    Launch(TrainingRequest),
    /// Handled inside the UI state, nothing for the app to do.
    Other,
}

/// Main UI controller.
#[derive(Debug, Default)]
pub struct Ui {
    show_help: bool,
    /// Open launch prompt, if any.
    launch: Option<LaunchForm>,
    theme: Theme,
    /// Current animation frame, for the loading spinner.
    animation_frame: usize,
}

impl Ui {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn update_animations(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Handle keyboard input. Navigation and view toggles are applied to
    /// `app_state` directly; everything else is returned to the app.
    pub fn handle_key_event(&mut self, key: KeyEvent, app_state: &mut AppState) -> UpdateKind {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return UpdateKind::Quit;
        }

        if let Some(form) = &mut self.launch {
            return match form.handle_key(key, &app_state.weights) {
                FormAction::Edit => UpdateKind::Other,
                FormAction::Cancel => {
                    self.launch = None;
                    UpdateKind::Other
                }
                FormAction::Submit(request) => {
                    self.launch = None;
                    UpdateKind::Launch(request)
                }
            };
        }

        if self.show_help {
            return match key.code {
                KeyCode::Char('q') => UpdateKind::Quit,
                KeyCode::Char('?') | KeyCode::Esc | KeyCode::F(1) => UpdateKind::ToggleHelp,
                _ => UpdateKind::Other,
            };
        }

        match key.code {
            KeyCode::Char('q') => UpdateKind::Quit,
            KeyCode::Char('?') | KeyCode::F(1) => UpdateKind::ToggleHelp,
            KeyCode::Down | KeyCode::Char('j') => {
                app_state.select_next();
                UpdateKind::Other
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app_state.select_prev();
                UpdateKind::Other
            }
            KeyCode::Enter => match app_state.cursor_job() {
                Some(job) => UpdateKind::Select(job.key.clone()),
                None => UpdateKind::Other,
            },
            KeyCode::Esc => UpdateKind::Deselect,
            KeyCode::Tab | KeyCode::BackTab => {
                app_state.toggle_channel();
                UpdateKind::Other
            }
            KeyCode::PageUp => {
                app_state.scroll_up(PAGE);
                UpdateKind::Other
            }
            KeyCode::PageDown => {
                app_state.scroll_down(PAGE);
                UpdateKind::Other
            }
            KeyCode::End => {
                app_state.log_scroll = 0;
                UpdateKind::Other
            }
            KeyCode::Char('x') | KeyCode::Delete => match app_state.cursor_job() {
                Some(job) => UpdateKind::Remove(job.key.clone()),
                None => UpdateKind::Other,
            },
            KeyCode::Char('c') => UpdateKind::Probe,
            KeyCode::Char('s') => self.open_launch(ProcessKind::Sovits),
            KeyCode::Char('g') => self.open_launch(ProcessKind::Gpt),
            _ => UpdateKind::Other,
        }
    }

    fn open_launch(&mut self, kind: ProcessKind) -> UpdateKind {
        self.launch = Some(LaunchForm::new(kind, ModelVersion::default()));
        UpdateKind::Other
    }

    pub fn render(&self, frame: &mut Frame, app_state: &AppState) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[1]);

        self.render_header(frame, rows[0], app_state);
        JobListView::render(frame, body[0], app_state, &self.theme);
        LogView::render(frame, body[1], app_state, &self.theme, self.animation_frame);
        self.render_status_line(frame, rows[2], app_state);

        if let Some(form) = &self.launch {
            LaunchView::render(frame, area, form, &app_state.weights, &self.theme);
        }
        if self.show_help {
            HelpView::render(frame, area, &self.theme);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, app_state: &AppState) {
        let header = Line::from(vec![
            Span::styled("gsv-console", self.theme.header_style),
            Span::raw("  "),
            Span::styled(app_state.endpoint.as_str(), self.theme.label_style),
            Span::raw("  "),
            Span::styled(
                app_state.connection.to_string(),
                self.theme.connection(&app_state.connection),
            ),
        ]);
        frame.render_widget(Paragraph::new(header), area);
    }

    fn render_status_line(&self, frame: &mut Frame, area: Rect, app_state: &AppState) {
        let mut spans = Vec::new();
        if let Some(remaining) = app_state.cooldown {
            spans.push(Span::styled(
                format!("cooling down {}s", remaining_secs(remaining)),
                self.theme.cooldown_style,
            ));
            spans.push(Span::raw(" | "));
        }
        if let ConnectionStatus::Error(message) = &app_state.connection {
            spans.push(Span::styled(message.as_str(), self.theme.error_style));
            spans.push(Span::raw(" | "));
        }
        if let Some(message) = &app_state.status_message {
            spans.push(Span::styled(message.as_str(), self.theme.normal_text));
            spans.push(Span::raw(" | "));
        }
        spans.push(Span::styled("Press ? for help", self.theme.help_style));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
