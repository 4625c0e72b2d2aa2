//! Presence & typing.
//!
//! [`PresenceTracker`] holds the ephemeral per-peer flags and publishes raw
//! typing signals. [`TypingDebouncer`] sits on top of it and drives a
//! [`TypingDriver`] per peer with a cancellable quiet timer, so a burst of
//! keystrokes becomes one `typing = true` and, after the quiet period, one
//! `typing = false`.
//!
//! Inbound typing flags have no expiry: if a peer's `false` is lost in
//! transit the flag stays set until the next signal from that peer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_core::{PresenceBook, TypingAction, TypingDriver, TypingInput};
use chat_types::{OnlineStatus, OutboundEvent, TypingNotice, TypingSignal, UserId};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connector::TransportConnector;
use crate::lock;
use crate::transport::Transport;

/// Ephemeral typing and online state, plus the outbound typing signal.
pub struct PresenceTracker<T: Transport + 'static> {
    book: Arc<Mutex<PresenceBook>>,
    connector: TransportConnector<T>,
}

impl<T: Transport + 'static> Clone for PresenceTracker<T> {
    fn clone(&self) -> Self {
        Self {
            book: Arc::clone(&self.book),
            connector: self.connector.clone(),
        }
    }
}

impl<T: Transport + 'static> PresenceTracker<T> {
    /// Create a tracker publishing via `connector`.
    pub fn new(connector: TransportConnector<T>) -> Self {
        Self {
            book: Arc::new(Mutex::new(PresenceBook::new())),
            connector,
        }
    }

    /// Publish a typing signal to `peer`. Every call publishes; debouncing
    /// is [`TypingDebouncer`]'s job.
    pub async fn set_typing(&self, peer: &UserId, is_typing: bool) {
        self.connector
            .publish(OutboundEvent::Typing(TypingNotice {
                receiver_id: peer.clone(),
                is_typing,
            }))
            .await;
    }

    /// Apply an inbound typing signal (last write wins).
    pub fn on_typing_event(&self, signal: &TypingSignal) {
        if lock(&self.book).set_typing(signal.user_id.clone(), signal.is_typing) {
            debug!(peer = %signal.user_id, is_typing = signal.is_typing, "typing changed");
        }
    }

    /// Apply an inbound presence signal (last write wins).
    pub fn on_online_status_event(&self, status: &OnlineStatus) {
        if lock(&self.book).set_online(status.user_id.clone(), status.is_online) {
            debug!(peer = %status.user_id, is_online = status.is_online, "presence changed");
        }
    }

    /// Whether `peer` is typing to us.
    pub fn is_typing(&self, peer: &UserId) -> bool {
        lock(&self.book).is_typing(peer)
    }

    /// Whether `peer` is online.
    pub fn is_online(&self, peer: &UserId) -> bool {
        lock(&self.book).is_online(peer)
    }

    /// Peers currently typing.
    pub fn typing_peers(&self) -> Vec<UserId> {
        lock(&self.book).typing_peers()
    }

    /// Peers currently online.
    pub fn online_peers(&self) -> Vec<UserId> {
        lock(&self.book).online_peers()
    }

    /// Forget all presence state.
    pub fn clear(&self) {
        lock(&self.book).clear();
    }
}

#[derive(Default)]
struct Composer {
    driver: Option<TypingDriver>,
    timer: Option<JoinHandle<()>>,
    // fresh on every arm/cancel so a timer that already fired is ignored
    epoch: u64,
}

/// Per-peer typing debounce with a quiet timer.
pub struct TypingDebouncer<T: Transport + 'static> {
    tracker: PresenceTracker<T>,
    quiet_period: Duration,
    composers: Arc<Mutex<HashMap<UserId, Composer>>>,
    // shared across peers so a removed and re-created composer never reuses an epoch
    epochs: Arc<AtomicU64>,
}

impl<T: Transport + 'static> Clone for TypingDebouncer<T> {
    fn clone(&self) -> Self {
        Self {
            tracker: self.tracker.clone(),
            quiet_period: self.quiet_period,
            composers: Arc::clone(&self.composers),
            epochs: Arc::clone(&self.epochs),
        }
    }
}

impl<T: Transport + 'static> TypingDebouncer<T> {
    /// Create a debouncer publishing through `tracker`.
    pub fn new(tracker: PresenceTracker<T>, quiet_period: Duration) -> Self {
        Self {
            tracker,
            quiet_period,
            composers: Arc::new(Mutex::new(HashMap::new())),
            epochs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The draft for `peer` changed.
    pub async fn input(&self, peer: &UserId) {
        self.drive(peer, TypingInput::Keystroke).await;
    }

    /// The composer for `peer` was closed or cleared.
    pub async fn stop(&self, peer: &UserId) {
        self.drive(peer, TypingInput::Stop).await;
    }

    /// A message to `peer` was sent.
    pub async fn message_sent(&self, peer: &UserId) {
        self.drive(peer, TypingInput::Sent).await;
    }

    /// Whether we currently announce typing to `peer`.
    pub fn is_typing(&self, peer: &UserId) -> bool {
        lock(&self.composers)
            .get(peer)
            .and_then(|c| c.driver.as_ref())
            .is_some_and(TypingDriver::is_typing)
    }

    /// Cancel every pending quiet timer and forget all composers.
    ///
    /// No `typing = false` is published; used on teardown.
    pub fn shutdown(&self) {
        for (_, composer) in lock(&self.composers).drain() {
            if let Some(timer) = composer.timer {
                timer.abort();
            }
        }
    }

    async fn drive(&self, peer: &UserId, input: TypingInput) {
        let emits = self.advance(peer, input, None);
        for is_typing in emits {
            self.tracker.set_typing(peer, is_typing).await;
        }
    }

    /// Feed `input` to the peer's driver and run its timer actions.
    ///
    /// With `expected_epoch` set, the input is a timer firing and is dropped
    /// if the timer was re-armed or cancelled since. Returns values to emit.
    fn advance(&self, peer: &UserId, input: TypingInput, expected_epoch: Option<u64>) -> Vec<bool> {
        let mut composers = lock(&self.composers);
        if let Some(epoch) = expected_epoch {
            match composers.get_mut(peer) {
                Some(composer) if composer.epoch == epoch => composer.timer = None,
                _ => return Vec::new(),
            }
        }
        let composer = composers.entry(peer.clone()).or_default();
        let quiet_period = self.quiet_period;
        let driver = composer
            .driver
            .get_or_insert_with(|| TypingDriver::new(quiet_period));

        let mut emits = Vec::new();
        for action in driver.on_input(input) {
            match action {
                TypingAction::Emit(is_typing) => emits.push(is_typing),
                TypingAction::ArmQuietTimer(delay) => {
                    composer.epoch = self.next_epoch();
                    if let Some(timer) = composer.timer.take() {
                        timer.abort();
                    }
                    composer.timer = Some(self.spawn_quiet_timer(peer.clone(), delay, composer.epoch));
                }
                TypingAction::CancelQuietTimer => {
                    composer.epoch = self.next_epoch();
                    if let Some(timer) = composer.timer.take() {
                        timer.abort();
                    }
                }
            }
        }

        // idle with nothing pending: forget the peer
        if !driver.is_typing() && composer.timer.is_none() {
            composers.remove(peer);
        }
        emits
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[cfg(test)]
    fn tracked_peers(&self) -> usize {
        lock(&self.composers).len()
    }

    fn spawn_quiet_timer(&self, peer: UserId, delay: Duration, epoch: u64) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(%peer, "typing quiet period elapsed");
            let emits = this.advance(&peer, TypingInput::QuietElapsed, Some(epoch));
            for is_typing in emits {
                this.tracker.set_typing(&peer, is_typing).await;
            }
        })
    }
}
