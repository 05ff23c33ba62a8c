//! Actors own their state and are driven by a single event channel.
//!
//! Every message carries the [`tracing::Span`] that was current when it was
//! sent, so a handler can enter it and keep the causal chain in the logs.

pub mod switcher;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;
use tracing::Span;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), Receiver(rx))
}

pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Sender(self.0.clone()) }
}

impl<Event> std::fmt::Debug for Sender<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Sender").finish()
    }
}

impl<Event> Sender<Event> {
    /// Sends an event, dropping it silently if the receiving actor is gone.
    pub fn send(&self, event: Event) { _ = self.try_send(event); }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}

pub struct Receiver<Event>(mpsc::UnboundedReceiver<(Span, Event)>);

impl<Event> Receiver<Event> {
    pub async fn recv(&mut self) -> Option<(Span, Event)> { self.0.recv().await }

    pub fn try_recv(&mut self) -> Option<(Span, Event)> { self.0.try_recv().ok() }
}
