//! UI theme definition.

use ratatui::style::{Color, Modifier, Style};

use crate::state::{ConnectionStatus, JobStatus};

/// Theme for the application UI.
#[derive(Debug, Clone)]
pub struct Theme {
    // Basic styles
    pub normal_text: Style,
    pub selected_style: Style,
    pub block_style: Style,
    pub focused_block_style: Style,
    pub header_style: Style,
    pub label_style: Style,
    pub help_style: Style,
    pub key_style: Style,

    // Log styles
    pub stdout_style: Style,
    pub stderr_style: Style,
    pub loading_style: Style,

    // Job status styles
    pub starting_style: Style,
    pub running_style: Style,
    pub failed_style: Style,

    // Status line styles
    pub connected_style: Style,
    pub disconnected_style: Style,
    pub cooldown_style: Style,
    pub error_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            normal_text: Style::default().fg(Color::White),
            selected_style: Style::default().fg(Color::Black).bg(Color::White),
            block_style: Style::default(),
            focused_block_style: Style::default().fg(Color::Cyan),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            label_style: Style::default().fg(Color::Gray),
            help_style: Style::default().fg(Color::DarkGray),
            key_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),

            stdout_style: Style::default().fg(Color::White),
            stderr_style: Style::default().fg(Color::LightRed),
            loading_style: Style::default().fg(Color::Yellow),

            starting_style: Style::default().fg(Color::Blue),
            running_style: Style::default().fg(Color::Green),
            failed_style: Style::default().fg(Color::Red),

            connected_style: Style::default().fg(Color::Green),
            disconnected_style: Style::default().fg(Color::DarkGray),
            cooldown_style: Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            error_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }
}

impl Theme {
    pub fn job_status(&self, status: JobStatus) -> Style {
        match status {
            JobStatus::Starting => self.starting_style,
            JobStatus::Running => self.running_style,
            JobStatus::ErrorStarting => self.failed_style,
        }
    }

    pub fn connection(&self, status: &ConnectionStatus) -> Style {
        match status {
            ConnectionStatus::Connected => self.connected_style,
            ConnectionStatus::Connecting => self.loading_style,
            ConnectionStatus::Disconnected => self.disconnected_style,
            ConnectionStatus::Error(_) => self.error_style,
        }
    }
}
