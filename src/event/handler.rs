//! Reads terminal input on a background task and exposes it as a stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crossterm::event::EventStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Event;

/// Stream of [`Event`]s. Dropping it stops the reader task.
pub struct EventHandler {
    events: UnboundedReceiverStream<Event>,
    token: CancellationToken,
}

impl EventHandler {
    /// Spawn the reader. Must be called from within a tokio runtime.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(Self::read_loop(tx, tick_rate, token.clone()));

        Self {
            events: UnboundedReceiverStream::new(rx),
            token,
        }
    }

    async fn read_loop(tx: mpsc::UnboundedSender<Event>, tick_rate: Duration, token: CancellationToken) {
        let mut reader = EventStream::new();
        let mut ticker = time::interval(tick_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => Event::Tick,
                next = reader.next() => match next {
                    Some(Ok(raw)) => match Event::from_crossterm(raw) {
                        Some(event) => event,
                        None => continue,
                    },
                    Some(Err(err)) => {
                        warn!(error = %err, "failed to read terminal event");
                        continue;
                    }
                    None => break,
                },
            };

            if tx.send(event).is_err() {
                break;
            }
        }
        debug!("terminal event reader stopped");
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl Stream for EventHandler {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
