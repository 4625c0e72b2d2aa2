//! ChatClient - the main interface for chatsync.
//!
//! This module provides [`ChatClient`], the composition root applications
//! construct once and own. It wires the connector's subscriptions to the
//! synchronizer and the presence tracker and exposes the operations a chat
//! UI needs.
//!
//! # Architecture
//!
//! ```text
//! Application → ChatClient ─┬→ MessageSynchronizer → StoreHandle
//!                           ├→ TypingDebouncer → PresenceTracker
//!                           └→ TransportConnector → Transport → Network
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chat_client::{ChatClient, Config, MockTransport};
//!
//! let client = ChatClient::new("u1".into(), MockTransport::new(), &Config::default());
//! client.start().await;
//! client.send_message(&"u2".into(), "hi", MessageKind::Text).await?;
//! client.stop().await;
//! ```

use std::sync::Mutex;

use chat_types::{
    ConversationId, EventKind, InboundEvent, Message, MessageId, MessageKind, UserId, WireError,
};
use tracing::info;

use crate::config::Config;
use crate::connector::{Subscription, TransportConnector};
use crate::hydration::{BackingStore, HydrationError};
use crate::lock;
use crate::presence::{PresenceTracker, TypingDebouncer};
use crate::store::{StoreHandle, StoreReader};
use crate::synchronizer::MessageSynchronizer;
use crate::transport::Transport;

/// The main chat client.
///
/// Owns the connection, the store and presence state for one identity.
pub struct ChatClient<T: Transport + 'static> {
    identity: UserId,
    connector: TransportConnector<T>,
    synchronizer: MessageSynchronizer<T>,
    presence: PresenceTracker<T>,
    debouncer: TypingDebouncer<T>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<T: Transport + 'static> ChatClient<T> {
    /// Create a client for `identity`. Nothing happens until [`start`](Self::start).
    pub fn new(identity: UserId, transport: T, config: &Config) -> Self {
        let connector = TransportConnector::new(
            transport,
            config.server.socket_url.clone(),
            config.reconnect_policy(),
        );
        let store = StoreHandle::new(identity.clone());
        let synchronizer = MessageSynchronizer::new(store, connector.clone());
        let presence = PresenceTracker::new(connector.clone());
        let debouncer = TypingDebouncer::new(presence.clone(), config.quiet_period());

        Self {
            identity,
            connector,
            synchronizer,
            presence,
            debouncer,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to inbound events and connect. Idempotent.
    pub async fn start(&self) {
        {
            let mut subscriptions = lock(&self.subscriptions);
            if subscriptions.is_empty() {
                subscriptions.extend(self.wire());
            }
        }
        info!(identity = %self.identity, "starting chat client");
        self.connector.connect(self.identity.clone()).await;
    }

    /// Unsubscribe, cancel typing timers and disconnect. Idempotent.
    pub async fn stop(&self) {
        let subscriptions: Vec<Subscription> = lock(&self.subscriptions).drain(..).collect();
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        self.debouncer.shutdown();
        self.connector.disconnect().await;
        info!(identity = %self.identity, "chat client stopped");
    }

    fn wire(&self) -> Vec<Subscription> {
        let synchronizer = self.synchronizer.clone();
        let on_message = self.connector.subscribe(EventKind::Message, move |event| {
            if let InboundEvent::Message(message) = event {
                synchronizer.receive_message(message.clone());
            }
        });

        let presence = self.presence.clone();
        let on_typing = self.connector.subscribe(EventKind::Typing, move |event| {
            if let InboundEvent::Typing(signal) = event {
                presence.on_typing_event(signal);
            }
        });

        let presence = self.presence.clone();
        let on_online = self.connector.subscribe(EventKind::OnlineStatus, move |event| {
            if let InboundEvent::OnlineStatus(status) = event {
                presence.on_online_status_event(status);
            }
        });

        vec![on_message, on_typing, on_online]
    }

    /// Send a message to `peer` and clear our typing indicator.
    pub async fn send_message(
        &self,
        peer: &UserId,
        text: &str,
        kind: MessageKind,
    ) -> Result<Message, WireError> {
        let message = self.synchronizer.send_message(peer, text, kind).await?;
        self.debouncer.message_sent(peer).await;
        Ok(message)
    }

    /// Mark a conversation read, returning the newly read message ids.
    pub async fn mark_as_read(&self, conversation_id: &ConversationId) -> Vec<MessageId> {
        self.synchronizer.mark_as_read(conversation_id).await
    }

    /// Report local typing activity towards `peer`.
    ///
    /// `true` counts as a keystroke: the first one announces typing and each
    /// one restarts the quiet timer, after which `false` is sent once.
    /// `false` clears the indicator right away.
    pub async fn set_typing(&self, peer: &UserId, is_typing: bool) {
        if is_typing {
            self.debouncer.input(peer).await;
        } else {
            self.debouncer.stop(peer).await;
        }
    }

    /// Cold-start hydration from the REST backend.
    pub async fn hydrate(&self, backing: &dyn BackingStore) -> Result<usize, HydrationError> {
        self.synchronizer.hydrate(backing).await
    }

    /// Read-only view of the conversation store.
    pub fn reader(&self) -> StoreReader {
        self.synchronizer.reader()
    }

    /// Peer typing and online state.
    pub fn presence(&self) -> &PresenceTracker<T> {
        &self.presence
    }

    /// The message synchronizer.
    pub fn synchronizer(&self) -> &MessageSynchronizer<T> {
        &self.synchronizer
    }

    /// The live connection.
    pub fn connector(&self) -> &TransportConnector<T> {
        &self.connector
    }

    /// The local identity.
    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }
}
