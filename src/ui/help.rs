//! Help overlay showing keyboard shortcuts.

use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::ui::Theme;

const SHORTCUTS: &[(&str, &str)] = &[
    ("j / ↓", "Next job"),
    ("k / ↑", "Previous job"),
    ("Enter", "Tail logs of the highlighted job"),
    ("Esc", "Stop tailing"),
    ("Tab", "Switch between stdout and stderr"),
    ("PgUp / PgDn", "Scroll the log view"),
    ("x", "Stop tracking the highlighted job"),
    ("s", "Start SoVITS training"),
    ("g", "Start GPT training"),
    ("c", "Check the connection to the service"),
    ("?", "Toggle this help screen"),
    ("q", "Quit"),
];

/// Help overlay showing keyboard shortcuts and usage information.
pub struct HelpView;

impl HelpView {
    pub fn render(frame: &mut Frame, area: Rect, theme: &Theme) {
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("gsv-console help")
            .borders(Borders::ALL)
            .style(theme.block_style);

        let mut text = vec![
            Line::from(Span::styled(
                "Shortcuts",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        text.extend(SHORTCUTS.iter().map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{key:>12}"), theme.key_style),
                Span::raw(format!("  {action}")),
            ])
        }));

        let help = Paragraph::new(text)
            .block(block)
            .style(theme.normal_text)
            .alignment(Alignment::Left);
        frame.render_widget(help, popup_area);
    }
}

/// A rect of the given percentages centered inside `r`.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let width = r.width * percent_x / 100;
    let height = r.height * percent_y / 100;
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}
