//! MessageSynchronizer - the single authority for message events.
//!
//! Locally composed and remotely received messages go through the same merge
//! ([`chat_core::apply_message`]), so an optimistic send and its server echo
//! can never produce diverging state. The local store is the source of truth;
//! outbound events are fire-and-forget.

use chat_core::{apply_hydration, apply_message, MergeOutcome};
use chat_types::{
    ConversationId, Message, MessageId, MessageKind, OutboundEvent, ReadReceipt, UserId, WireError,
};
use tracing::{debug, info, warn};

use crate::connector::TransportConnector;
use crate::hydration::{BackingStore, HydrationError};
use crate::store::{StoreHandle, StoreReader};
use crate::transport::Transport;

/// Turns message events into store mutations and outbound events.
pub struct MessageSynchronizer<T: Transport + 'static> {
    store: StoreHandle,
    connector: TransportConnector<T>,
}

impl<T: Transport + 'static> Clone for MessageSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            connector: self.connector.clone(),
        }
    }
}

impl<T: Transport + 'static> MessageSynchronizer<T> {
    /// Create a synchronizer writing to `store` and publishing via `connector`.
    pub fn new(store: StoreHandle, connector: TransportConnector<T>) -> Self {
        Self { store, connector }
    }

    /// Read-only view of the store.
    pub fn reader(&self) -> StoreReader {
        self.store.reader()
    }

    /// Compose, apply optimistically, then publish.
    ///
    /// The generated id is final; the server echo is absorbed as a duplicate.
    /// A message the live stream would reject (e.g. addressed to self) is
    /// refused before anything is stored or sent.
    pub async fn send_message(
        &self,
        peer: &UserId,
        text: &str,
        kind: MessageKind,
    ) -> Result<Message, WireError> {
        let self_id = self.store.write(|store| store.self_id().clone());
        let message = Message::compose(self_id, peer.clone(), text, kind);
        message.validate()?;

        let outcome = self.store.write(|store| apply_message(store, message.clone()));
        debug!(id = %message.id, ?outcome, "optimistic apply");

        self.connector
            .publish(OutboundEvent::SendMessage(message.clone()))
            .await;
        Ok(message)
    }

    /// Merge a message from the live stream (or an echo of our own).
    pub fn receive_message(&self, message: Message) -> MergeOutcome {
        let id = message.id.clone();
        let outcome = self.store.write(|store| apply_message(store, message));
        match &outcome {
            MergeOutcome::Foreign => warn!(%id, "dropping message not addressed to or from us"),
            MergeOutcome::Invalid => warn!(%id, "dropping malformed message"),
            MergeOutcome::Duplicate { .. } => debug!(%id, "duplicate message ignored"),
            MergeOutcome::Created { conversation_id, .. } => {
                info!(%id, %conversation_id, "new conversation")
            }
            MergeOutcome::Appended { .. } => debug!(%id, "message appended"),
        }
        outcome
    }

    /// Mark every incoming message of a conversation read.
    ///
    /// Publishes one `mark_read` per message that was actually unread and
    /// returns those ids.
    pub async fn mark_as_read(&self, conversation_id: &ConversationId) -> Vec<MessageId> {
        let newly_read = self
            .store
            .write(|store| store.mark_incoming_read(conversation_id));
        debug!(%conversation_id, count = newly_read.len(), "marked read");

        for message_id in &newly_read {
            self.connector
                .publish(OutboundEvent::MarkRead(ReadReceipt {
                    message_id: message_id.clone(),
                }))
                .await;
        }
        newly_read
    }

    /// Sum of unread counts across conversations.
    pub fn total_unread_count(&self) -> u32 {
        self.store.reader().total_unread_count()
    }

    /// Fold a REST snapshot into the store.
    ///
    /// Fails only if the conversation list itself cannot be fetched; a
    /// conversation whose messages fail to load is hydrated from its record
    /// alone. Returns the number of conversations hydrated.
    pub async fn hydrate(&self, backing: &dyn BackingStore) -> Result<usize, HydrationError> {
        let records = backing.conversations().await?;
        let mut hydrated = 0;

        for record in records {
            let messages = match backing.messages(&record.id).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(conversation = %record.id, error = %e, "failed to load messages");
                    Vec::new()
                }
            };
            match self
                .store
                .write(|store| apply_hydration(store, &record, messages))
            {
                Some(conversation_id) => {
                    debug!(remote = %record.id, %conversation_id, "hydrated");
                    hydrated += 1;
                }
                None => debug!(remote = %record.id, "skipping non-direct conversation"),
            }
        }

        info!(conversations = hydrated, "hydration complete");
        Ok(hydrated)
    }
}
