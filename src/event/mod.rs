//! Terminal events.
//!
//! Key presses, resizes and a regular tick are merged into one stream by
//! [`EventHandler`]; the app loop consumes them alongside its own messages.

pub mod handler;

pub use handler::EventHandler;

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, KeyEvent, KeyEventKind};

/// Default tick interval used to redraw between input.
pub const DEFAULT_TICK_RATE: Duration = Duration::from_millis(250);

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),
    /// Terminal resize event
    Resize(u16, u16),
    /// Regular tick event for animations and countdowns
    Tick,
}

impl Event {
    /// Map a terminal event, dropping the ones the console ignores
    /// (mouse, focus, paste, key releases).
    pub fn from_crossterm(event: CrosstermEvent) -> Option<Self> {
        match event {
            CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => Some(Event::Key(key)),
            CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
            _ => None,
        }
    }
}
