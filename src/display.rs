//! The in-memory state presented to the view.
//!
//! A single task owns the [`DisplayState`]. Writers and readers talk to it
//! over one channel, so updates are applied one at a time in the order they
//! arrive and readers always get a complete snapshot.
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use temperature_common::{CurrentTemperature, NormalizedReading};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error};

use crate::{spawn, PIPE_SIZE};

/// Everything the view needs to render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    /// Latest instantaneous reading, if one was ever received.
    pub current: Option<CurrentTemperature>,
    /// Readings for the last 24 hours, ascending.
    pub hourly: Vec<NormalizedReading>,
    /// Readings for the last 30 days, ascending.
    pub daily: Vec<NormalizedReading>,
    /// When `current` was last replaced.
    pub current_updated_at: Option<DateTime<Utc>>,
    /// When `hourly` and `daily` were last replaced.
    pub history_updated_at: Option<DateTime<Utc>>,
}

impl DisplayState {
    /// Has the history not been refreshed for longer than `max_age`?
    ///
    /// History that was never loaded is not stale, it is still loading.
    #[must_use]
    pub fn is_history_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
        self.history_updated_at
            .is_some_and(|updated_at| now - updated_at > max_age)
    }
}

/// The display state can no longer be used.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// The store was closed or its task has gone.
    #[error("The display state is closed")]
    Closed,
}

type Snapshot = Arc<DisplayState>;

enum Message {
    SetCurrent(CurrentTemperature),
    SetHistory {
        hourly: Vec<NormalizedReading>,
        daily: Vec<NormalizedReading>,
    },
    Get(oneshot::Sender<Snapshot>),
    Subscribe(oneshot::Sender<(broadcast::Receiver<Snapshot>, Snapshot)>),
}

/// Write access to the display state.
#[derive(Clone)]
pub struct Sender {
    name: String,
    tx: mpsc::Sender<Message>,
    closed: Arc<AtomicBool>,
}

impl Sender {
    async fn send(&self, msg: Message) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.tx.send(msg).await.map_err(|_| {
            error!("{}: send failed", self.name);
            Error::Closed
        })
    }

    /// Replace the current reading.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the store no longer accepts updates.
    pub async fn set_current(&self, current: CurrentTemperature) -> Result<(), Error> {
        self.send(Message::SetCurrent(current)).await
    }

    /// Replace both history windows at once.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the store no longer accepts updates.
    pub async fn set_history(
        &self,
        hourly: Vec<NormalizedReading>,
        daily: Vec<NormalizedReading>,
    ) -> Result<(), Error> {
        self.send(Message::SetHistory { hourly, daily }).await
    }

    /// Stop accepting updates. Updates already queued are discarded too.
    ///
    /// Calling this more than once has no further effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("{}: closed for updates", self.name);
        }
    }

    /// Has [`Sender::close`] been called?
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Read access to the display state.
#[derive(Clone)]
pub struct Receiver {
    name: String,
    tx: mpsc::Sender<Message>,
}

impl Receiver {
    /// Get a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the store task has gone.
    pub async fn get(&self) -> Result<Snapshot, Error> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Message::Get(tx)).await.is_err() {
            error!("{}: get/send failed", self.name);
            return Err(Error::Closed);
        }
        rx.await.map_err(|_| {
            error!("{}: get/await failed", self.name);
            Error::Closed
        })
    }

    /// Subscribe to state changes.
    ///
    /// The first value received is the state at the time of subscribing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the store task has gone.
    pub async fn subscribe(&self) -> Result<Subscription, Error> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Message::Subscribe(tx)).await.is_err() {
            error!("{}: subscribe/send failed", self.name);
            return Err(Error::Closed);
        }
        let (rx, initial) = rx.await.map_err(|_| {
            error!("{}: subscribe/await failed", self.name);
            Error::Closed
        })?;
        Ok(Subscription {
            rx,
            initial: Some(initial),
        })
    }
}

/// A stream of state snapshots.
pub struct Subscription {
    rx: broadcast::Receiver<Snapshot>,
    initial: Option<Snapshot>,
}

impl Subscription {
    /// Wait for the next snapshot.
    ///
    /// If the subscriber falls behind, intermediate snapshots are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the store task has gone.
    pub async fn recv(&mut self) -> Result<Snapshot, Error> {
        if let Some(initial) = self.initial.take() {
            return Ok(initial);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(broadcast::error::RecvError::Closed) => return Err(Error::Closed),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("recv: skipped {skipped} snapshots");
                }
            }
        }
    }
}

/// Create the display state store.
#[must_use]
pub fn create_store(name: impl Into<String>) -> (Sender, Receiver) {
    let (tx, mut rx) = mpsc::channel::<Message>(PIPE_SIZE);
    let (out_tx, out_rx) = broadcast::channel::<Snapshot>(PIPE_SIZE);
    drop(out_rx);

    let name = name.into();
    let closed = Arc::new(AtomicBool::new(false));

    let sender = Sender {
        name: name.clone(),
        tx: tx.clone(),
        closed: closed.clone(),
    };
    let receiver = Receiver {
        name: name.clone(),
        tx,
    };

    spawn(async move {
        let mut state: Snapshot = Arc::new(DisplayState::default());

        while let Some(msg) = rx.recv().await {
            let next = match msg {
                Message::Get(tx) => {
                    if tx.send(state.clone()).is_err() {
                        error!("{name}: get send failed");
                    }
                    continue;
                }
                Message::Subscribe(tx) => {
                    if tx.send((out_tx.subscribe(), state.clone())).is_err() {
                        error!("{name}: subscribe send failed");
                    }
                    continue;
                }
                _ if closed.load(Ordering::SeqCst) => {
                    debug!("{name}: discarding update received after close");
                    continue;
                }
                Message::SetCurrent(current) => DisplayState {
                    current: Some(current),
                    current_updated_at: Some(Utc::now()),
                    ..DisplayState::clone(&state)
                },
                Message::SetHistory { hourly, daily } => DisplayState {
                    hourly,
                    daily,
                    history_updated_at: Some(Utc::now()),
                    ..DisplayState::clone(&state)
                },
            };

            state = Arc::new(next);
            if let Err(_err) = out_tx.send(state.clone()) {
                // It is not an error if there are no subscribers.
            }
        }

        debug!("{name}: all handles dropped");
    });

    (sender, receiver)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn reading(timestamp: i64, temperature: f64) -> NormalizedReading {
        NormalizedReading {
            timestamp,
            temperature,
            formatted_time: timestamp.to_string(),
        }
    }

    const fn current(temperature: f64) -> CurrentTemperature {
        CurrentTemperature {
            temperature,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_empty() {
        let (_tx, rx) = create_store("test");
        let state = rx.get().await.unwrap();
        assert_eq!(*state, DisplayState::default());
    }

    #[tokio::test]
    async fn test_updates_are_applied_in_order() {
        let (tx, rx) = create_store("test");

        tx.set_current(current(20.0)).await.unwrap();
        tx.set_current(current(21.0)).await.unwrap();
        tx.set_history(vec![reading(1, 1.0)], vec![reading(2, 2.0)])
            .await
            .unwrap();
        tx.set_history(vec![reading(3, 3.0)], vec![]).await.unwrap();

        let state = rx.get().await.unwrap();
        assert_eq!(state.current, Some(current(21.0)));
        assert_eq!(state.hourly, vec![reading(3, 3.0)]);
        assert!(state.daily.is_empty());
        assert!(state.current_updated_at.is_some());
        assert!(state.history_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_history_update_keeps_current() {
        let (tx, rx) = create_store("test");

        tx.set_current(current(20.0)).await.unwrap();
        tx.set_history(vec![reading(1, 1.0)], vec![]).await.unwrap();

        let state = rx.get().await.unwrap();
        assert_eq!(state.current, Some(current(20.0)));
    }

    #[tokio::test]
    async fn test_close_discards_updates() {
        let (tx, rx) = create_store("test");

        tx.set_current(current(20.0)).await.unwrap();
        tx.close();
        tx.close();

        assert!(tx.is_closed());
        assert_eq!(tx.set_current(current(25.0)).await, Err(Error::Closed));
        assert_eq!(
            tx.set_history(vec![reading(1, 1.0)], vec![]).await,
            Err(Error::Closed)
        );

        let state = rx.get().await.unwrap();
        assert_eq!(state.current, Some(current(20.0)));
        assert!(state.hourly.is_empty());
    }

    #[tokio::test]
    async fn test_queued_update_discarded_after_close() {
        let (tx, rx) = create_store("test");

        // Queue the update before closing, then close before the store runs.
        tx.tx.send(Message::SetCurrent(current(30.0))).await.ok().unwrap();
        tx.close();

        let state = rx.get().await.unwrap();
        assert_eq!(state.current, None);
    }

    #[tokio::test]
    async fn test_subscribe() {
        let (tx, rx) = create_store("test");
        let mut sub = rx.subscribe().await.unwrap();

        let initial = sub.recv().await.unwrap();
        assert_eq!(initial.current, None);

        tx.set_current(current(19.5)).await.unwrap();
        let next = sub.recv().await.unwrap();
        assert_eq!(next.current, Some(current(19.5)));
    }

    #[tokio::test]
    async fn test_subscription_closes_with_store() {
        let (tx, rx) = create_store("test");
        let mut sub = rx.subscribe().await.unwrap();
        sub.recv().await.unwrap();

        drop(tx);
        drop(rx);

        assert_eq!(sub.recv().await, Err(Error::Closed));
    }

    #[test]
    fn test_history_staleness() {
        let now = Utc::now();
        let mut state = DisplayState::default();
        assert!(!state.is_history_stale(now, TimeDelta::minutes(3)));

        state.history_updated_at = Some(now - TimeDelta::minutes(2));
        assert!(!state.is_history_stale(now, TimeDelta::minutes(3)));

        state.history_updated_at = Some(now - TimeDelta::minutes(4));
        assert!(state.is_history_stale(now, TimeDelta::minutes(3)));
    }
}
