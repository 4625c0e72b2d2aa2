//! Shared access to the conversation store.
//!
//! [`StoreHandle`] is the write capability, held by the synchronizer.
//! [`StoreReader`] is a read-only view handed to UI code. Both are explicit
//! handles passed by the composition root; there is no global store.

use std::sync::{Arc, Mutex};

use chat_core::ConversationStore;
use chat_types::{Conversation, ConversationId, Message, UserId};

use crate::lock;

/// Write access to the store.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<Mutex<ConversationStore>>,
}

impl StoreHandle {
    /// Create an empty store owned by `self_id`.
    pub fn new(self_id: UserId) -> Self {
        Self {
            store: Arc::new(Mutex::new(ConversationStore::new(self_id))),
        }
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// Mutations inside one call are atomic with respect to every other
    /// reader and writer.
    pub fn write<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        f(&mut lock(&self.store))
    }

    /// A read-only view of the same store.
    pub fn reader(&self) -> StoreReader {
        StoreReader {
            store: Arc::clone(&self.store),
        }
    }
}

/// Read-only view of the store.
///
/// Queries return owned snapshots so no lock outlives the call.
#[derive(Clone)]
pub struct StoreReader {
    store: Arc<Mutex<ConversationStore>>,
}

impl StoreReader {
    /// The local identity.
    pub fn self_id(&self) -> UserId {
        lock(&self.store).self_id().clone()
    }

    /// The direct conversation with `peer`, if any.
    pub fn get_conversation(&self, peer: &UserId) -> Option<Conversation> {
        lock(&self.store).get_conversation(peer).cloned()
    }

    /// A conversation by id.
    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        lock(&self.store).conversation(conversation_id).cloned()
    }

    /// Messages of a conversation in arrival order.
    pub fn get_messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        lock(&self.store).get_messages(conversation_id).to_vec()
    }

    /// All conversations, newest activity first.
    pub fn list_conversations(&self) -> Vec<Conversation> {
        lock(&self.store)
            .list_conversations()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sum of unread counts across conversations.
    pub fn total_unread_count(&self) -> u32 {
        lock(&self.store).total_unread_count()
    }
}

impl std::fmt::Debug for StoreReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = lock(&self.store);
        f.debug_struct("StoreReader")
            .field("self_id", store.self_id())
            .field("conversations", &store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::apply_message;
    use chat_types::MessageKind;

    #[test]
    fn reader_sees_writes() {
        let handle = StoreHandle::new("u1".into());
        let reader = handle.reader();
        assert!(reader.list_conversations().is_empty());

        let message = Message::compose("u2".into(), "u1".into(), "yo", MessageKind::Text);
        handle.write(|store| apply_message(store, message));

        let conversation = reader.get_conversation(&"u2".into()).unwrap();
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(reader.get_messages(&conversation.id).len(), 1);
        assert_eq!(reader.total_unread_count(), 1);
    }

    #[test]
    fn snapshots_are_detached() {
        let handle = StoreHandle::new("u1".into());
        let reader = handle.reader();
        let message = Message::compose("u1".into(), "u2".into(), "hi", MessageKind::Text);
        let id = message.conversation_id();
        handle.write(|store| apply_message(store, message));

        let before = reader.get_messages(&id);
        let again = Message::compose("u1".into(), "u2".into(), "again", MessageKind::Text);
        handle.write(|store| apply_message(store, again));

        assert_eq!(before.len(), 1);
        assert_eq!(reader.get_messages(&id).len(), 2);
    }

    #[test]
    fn reader_reports_identity() {
        let handle = StoreHandle::new("u1".into());
        assert_eq!(handle.reader().self_id(), UserId::from("u1"));
    }
}
