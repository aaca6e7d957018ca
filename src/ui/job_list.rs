//! Job list showing every tracked training job, newest first.

use std::borrow::Cow;

use chrono::Local;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::state::{ActiveJob, AppState, JobKey};
use crate::ui::Theme;

const NAME_WIDTH: usize = 24;
const POLLED_MARKER: &str = "▶";

pub struct JobListView;

impl JobListView {
    pub fn render(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let title = Line::from(vec![
            Span::styled(format!("Jobs ({})", app_state.jobs.len()), theme.header_style),
            Span::styled(
                format!(" {} running ", app_state.running_count()),
                theme.label_style,
            ),
        ]);
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .style(theme.block_style);

        if app_state.jobs.is_empty() {
            let hint = Paragraph::new(
                "No jobs yet. Start one with --sovits NAME or --gpt NAME.",
            )
            .style(theme.help_style)
            .block(block);
            frame.render_widget(hint, area);
            return;
        }

        let header = Row::new(
            ["", "Experiment", "Kind", "Ver", "Status", "PID", "Started", "Up"]
                .into_iter()
                .map(|h| Cell::from(h).style(theme.header_style)),
        );

        let rows = app_state
            .jobs
            .iter()
            .map(|job| format_job_row(job, app_state.selected.as_ref(), theme));

        let table = Table::new(
            rows,
            [
                Constraint::Length(1),
                Constraint::Min(NAME_WIDTH as u16 / 2),
                Constraint::Length(6),
                Constraint::Length(3),
                Constraint::Length(14),
                Constraint::Length(7),
                Constraint::Length(8),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(block)
        .highlight_style(theme.selected_style);

        let mut table_state = TableState::default();
        table_state.select(app_state.cursor);
        frame.render_stateful_widget(table, area, &mut table_state);
    }
}

fn format_job_row<'a>(job: &'a ActiveJob, polled: Option<&JobKey>, theme: &Theme) -> Row<'a> {
    let marker = if polled == Some(&job.key) { POLLED_MARKER } else { "" };
    let pid = job
        .process_id
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());

    Row::new(vec![
        Cell::from(marker).style(theme.running_style),
        Cell::from(truncate(job.key.experiment_name(), NAME_WIDTH)),
        Cell::from(job.key.process_kind().label()),
        Cell::from(job.key.version().as_str()),
        Cell::from(job.status.to_string()).style(theme.job_status(job.status)),
        Cell::from(pid),
        Cell::from(
            job.started_wall
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
        ),
        Cell::from(format_duration(&job.elapsed())),
    ])
}

/// Format a duration as a human-readable string.
fn format_duration(duration: &chrono::Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Cut `text` to at most `max_width` terminal columns, ending in an ellipsis
/// when something was dropped.
fn truncate(text: &str, max_width: usize) -> Cow<'_, str> {
    if text.width() <= max_width {
        return Cow::Borrowed(text);
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let width = ch.width().unwrap_or(0);
        if used + width + 1 > max_width {
            break;
        }
        out.push(ch);
        used += width;
    }
    out.push('…');
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0s")]
    #[case(59, "59s")]
    #[case(61, "1m 1s")]
    #[case(3_725, "1h 2m")]
    fn durations_are_compact(#[case] secs: i64, #[case] expected: &str) {
        assert_eq!(format_duration(&chrono::Duration::seconds(secs)), expected);
    }

    #[rstest]
    #[case("singer1", 10, "singer1")]
    #[case("a_very_long_experiment", 8, "a_very_…")]
    #[case("长长长长长", 6, "长长…")]
    fn names_fit_their_column(#[case] name: &str, #[case] width: usize, #[case] expected: &str) {
        let cut = truncate(name, width);
        assert_eq!(cut, expected);
        assert!(cut.width() <= width);
    }
}
