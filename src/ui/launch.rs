//! Prompt for starting a training job from inside the console.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Alignment, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::client::TrainingRequest;
use crate::state::{ModelVersion, ProcessKind, WeightCatalog};
use crate::ui::help::centered_rect;
use crate::ui::Theme;

/// Outcome of a key press inside the form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    /// Keep the form open.
    Edit,
    Cancel,
    Submit(TrainingRequest),
}

/// Experiment name, version and starting weights of a job about to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchForm {
    kind: ProcessKind,
    name: String,
    version: ModelVersion,
    /// Index into [`WeightCatalog::choices`].
    weight: usize,
}

impl LaunchForm {
    pub fn new(kind: ProcessKind, version: ModelVersion) -> Self {
        Self {
            kind,
            name: String::new(),
            version,
            weight: 0,
        }
    }

    /// Weight the job would start from, falling back to the built-in default
    /// when the listing shrank under the current choice.
    pub fn weight<'a>(&self, weights: &'a WeightCatalog) -> &'a str {
        let choices = weights.choices(self.kind);
        choices.get(self.weight).copied().unwrap_or(choices[0])
    }

    pub fn handle_key(&mut self, key: KeyEvent, weights: &WeightCatalog) -> FormAction {
        match key.code {
            KeyCode::Esc => FormAction::Cancel,
            KeyCode::Enter => {
                let name = self.name.trim();
                if name.is_empty() {
                    return FormAction::Edit;
                }
                let request =
                    TrainingRequest::new(self.kind, name, self.version).with_pretrained(self.weight(weights));
                FormAction::Submit(request)
            }
            KeyCode::Tab => {
                self.version = self.version.cycled();
                FormAction::Edit
            }
            KeyCode::Right => {
                self.weight = (self.weight + 1) % weights.choices(self.kind).len();
                FormAction::Edit
            }
            KeyCode::Left => {
                let count = weights.choices(self.kind).len();
                self.weight = (self.weight.min(count - 1) + count - 1) % count;
                FormAction::Edit
            }
            KeyCode::Backspace => {
                self.name.pop();
                FormAction::Edit
            }
            KeyCode::Char(c) if !c.is_control() => {
                self.name.push(c);
                FormAction::Edit
            }
            _ => FormAction::Edit,
        }
    }
}

pub struct LaunchView;

impl LaunchView {
    pub fn render(frame: &mut Frame, area: Rect, form: &LaunchForm, weights: &WeightCatalog, theme: &Theme) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(Span::styled(
                format!("Start {} training", form.kind.label()),
                theme.header_style,
            ))
            .borders(Borders::ALL)
            .style(theme.focused_block_style);

        let choices = weights.choices(form.kind).len();
        let weight = form.weight(weights);
        let weight_name = weight.rsplit('/').next().unwrap_or(weight);
        let text = vec![
            Line::from(vec![
                Span::styled("  Experiment  ", theme.label_style),
                Span::styled(format!("{}_", form.name), theme.normal_text),
            ]),
            Line::from(vec![
                Span::styled("     Version  ", theme.label_style),
                Span::styled(form.version.as_str(), theme.normal_text),
            ]),
            Line::from(vec![
                Span::styled("     Weights  ", theme.label_style),
                Span::styled(weight_name, theme.normal_text),
                Span::styled(
                    format!("  ({}/{choices})", form.weight.min(choices - 1) + 1),
                    theme.help_style,
                ),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter", theme.key_style),
                Span::raw(" start  "),
                Span::styled("Tab", theme.key_style),
                Span::raw(" version  "),
                Span::styled("←/→", theme.key_style),
                Span::raw(" weights  "),
                Span::styled("Esc", theme.key_style),
                Span::raw(" cancel"),
            ]),
        ];

        let prompt = Paragraph::new(text).block(block).alignment(Alignment::Left);
        frame.render_widget(prompt, popup_area);
    }
}
