//! Explicit change notification with owned listener handles.
//!
//! An [`Emitter`] fans each event out to every live [`Subscription`]. Dropping
//! (or calling [`Subscription::unsubscribe`] on) a handle releases the listener;
//! the emitter prunes closed listeners on the next emit.

use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug)]
pub struct Emitter<T: Clone> {
    listeners: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Default for Emitter<T> {
    fn default() -> Self {
        Self { listeners: Vec::new() }
    }
}

impl<T: Clone> Emitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        Subscription { rx }
    }

    pub fn emit(&mut self, event: T) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
        trace!("Emitted event to {} listeners", self.listeners.len());
    }
}

#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next event. `None` once the emitter is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}
