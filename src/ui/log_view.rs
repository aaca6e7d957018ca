//! Tail view of the selected job's stdout and stderr.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::Frame;

use crate::state::{AppState, Channel};
use crate::ui::Theme;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub struct LogView;

impl LogView {
    pub fn render(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme, frame_no: usize) {
        let title = match &app_state.selected {
            Some(key) => format!("Logs: {key}"),
            None => "Logs".to_string(),
        };
        let block = Block::default()
            .title(Span::styled(title, theme.header_style))
            .borders(Borders::ALL)
            .style(if app_state.selected.is_some() {
                theme.focused_block_style
            } else {
                theme.block_style
            });
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);

        Self::render_tabs(frame, chunks[0], app_state, theme, frame_no);

        if app_state.selected.is_none() {
            let hint = Paragraph::new("Press Enter on a job to tail its logs.").style(theme.help_style);
            frame.render_widget(hint, chunks[1]);
            return;
        }

        let lines = &app_state.logs.lines;
        let skip = lines.len().saturating_sub(chunks[1].height as usize);
        let style = match app_state.channel {
            Channel::Stdout => theme.stdout_style,
            Channel::Stderr => theme.stderr_style,
        };
        let text: Vec<Line> = lines[skip..]
            .iter()
            .map(|line| Line::from(Span::styled(line.as_str(), style)))
            .collect();
        frame.render_widget(Paragraph::new(text), chunks[1]);
    }

    fn render_tabs(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme, frame_no: usize) {
        let titles: Vec<Line> = Channel::ALL
            .iter()
            .map(|&channel| {
                Line::from(format!(
                    "{} ({}) @{}",
                    channel,
                    app_state.logs.len(channel),
                    app_state.logs.next_offset(channel)
                ))
            })
            .collect();
        let selected = Channel::ALL
            .iter()
            .position(|&c| c == app_state.channel)
            .unwrap_or(0);

        let mut tabs_area = area;
        if app_state.logs.is_loading {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(1), Constraint::Length(12)])
                .split(area);
            tabs_area = chunks[0];
            let spinner = format!("{} loading", SPINNER[frame_no % SPINNER.len()]);
            frame.render_widget(Paragraph::new(spinner).style(theme.loading_style), chunks[1]);
        }

        let tabs = Tabs::new(titles)
            .select(selected)
            .style(theme.label_style)
            .highlight_style(theme.key_style);
        frame.render_widget(tabs, tabs_area);
    }
}
