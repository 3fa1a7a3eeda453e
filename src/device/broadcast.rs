use crate::color::PixelColor;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// What an observer sees: brightness scaled pixels plus the last command.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub pixels: Vec<PixelColor>,
    pub brightness: u8,
    pub command: u8,
    pub repeat: bool,
}

/// Handed to a new observer: the state at the moment it attached, followed
/// by every published update.
#[derive(Debug)]
pub struct Subscription {
    pub current: StateSnapshot,
    pub updates: watch::Receiver<StateSnapshot>,
}

/// Coalesces state changes into at most one publish per interval.
///
/// Observers only ever see the latest published snapshot, so a slow reader
/// skips intermediate frames but never misses the final one.
#[derive(Debug)]
pub struct Broadcaster {
    tx: watch::Sender<StateSnapshot>,
    interval: Duration,
    last_publish: Option<Instant>,
    pending: bool,
}

impl Broadcaster {
    pub fn new(interval: Duration, initial: StateSnapshot) -> Self {
        let (tx, _) = watch::channel(initial);

        Self {
            tx,
            interval,
            last_publish: None,
            pending: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn subscribe(&self, current: StateSnapshot) -> Subscription {
        let updates = self.tx.subscribe();
        debug!("subscriber attached, {} total", self.tx.receiver_count());

        Subscription { current, updates }
    }

    /// Signals that the state changed.
    pub fn notify<F>(&mut self, now: Instant, snapshot: F)
    where
        F: FnOnce() -> StateSnapshot,
    {
        if self.is_due(now) {
            self.publish(now, snapshot());
        } else {
            self.pending = true;
        }
    }

    /// Publishes a deferred change once the interval has passed.
    pub fn flush<F>(&mut self, now: Instant, snapshot: F)
    where
        F: FnOnce() -> StateSnapshot,
    {
        if self.pending && self.is_due(now) {
            self.publish(now, snapshot());
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.last_publish
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    fn publish(&mut self, now: Instant, snapshot: StateSnapshot) {
        self.tx.send_replace(snapshot);
        self.last_publish = Some(now);
        self.pending = false;
    }
}
