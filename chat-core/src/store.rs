//! Conversation store for chatsync.
//!
//! The authoritative local state: conversation id → summary and
//! conversation id → message list. All mutations are synchronous and total.
//! An unknown conversation id on append creates the conversation rather
//! than failing.
//!
//! The store keeps two structural guarantees on its own:
//! - `last_message` is the message with the greatest `created_at`; on equal
//!   timestamps the later arrival wins. `updated_at` follows it.
//! - `list_conversations()` is sorted by `updated_at` descending, stable for
//!   ties.
//!
//! Unread bookkeeping is driven by [`crate::merge`], which owns the rule for
//! when a message counts.

use chat_types::{Conversation, ConversationId, Message, MessageId, UserId};
use std::collections::HashMap;

/// Result of appending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Appended to an existing conversation.
    Appended,
    /// The conversation did not exist and was created.
    Created,
    /// A message with the same id is already present; nothing appended.
    Duplicate,
}

/// Local conversation state for one signed-in identity.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    self_id: UserId,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    /// Conversation ids sorted by `updated_at` descending.
    order: Vec<ConversationId>,
}

impl ConversationStore {
    /// Create an empty store for `self_id`.
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            conversations: HashMap::new(),
            messages: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The local identity.
    pub fn self_id(&self) -> &UserId {
        &self.self_id
    }

    /// Insert or replace a conversation summary.
    ///
    /// Messages already stored for the conversation are kept, and if any
    /// exist the last-message fields are re-derived from them.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        let id = conversation.id.clone();
        if self.conversations.insert(id.clone(), conversation).is_none() {
            self.order.insert(0, id.clone());
        }
        self.refresh_last_message(&id);
        self.reorder();
    }

    /// Append a message to a conversation, creating the conversation if needed.
    ///
    /// A message whose id is already present is not appended again; if the
    /// incoming copy is read, the stored copy's flag is raised.
    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> AppendOutcome {
        let list = self.messages.entry(conversation_id.clone()).or_default();
        if let Some(pos) = list.iter().position(|m| m.id == message.id) {
            if message.read && list[pos].mark_read() {
                self.sync_last_message_read(conversation_id);
            }
            return AppendOutcome::Duplicate;
        }
        list.push(message.clone());

        let outcome = match self.conversations.get_mut(conversation_id) {
            Some(conversation) => {
                let newer = conversation
                    .last_message
                    .as_ref()
                    .map_or(true, |last| message.created_at >= last.created_at);
                if newer {
                    conversation.updated_at = message.created_at;
                    conversation.last_message = Some(message);
                }
                AppendOutcome::Appended
            }
            None => {
                let mut conversation = Conversation::direct(
                    message.sender_id.clone(),
                    message.receiver_id.clone(),
                    message.created_at,
                );
                conversation.id = conversation_id.clone();
                conversation.last_message = Some(message);
                self.conversations.insert(conversation_id.clone(), conversation);
                self.order.insert(0, conversation_id.clone());
                AppendOutcome::Created
            }
        };
        self.reorder();
        outcome
    }

    /// Overwrite a conversation's unread count. Unknown ids are ignored.
    pub fn set_unread_count(&mut self, conversation_id: &ConversationId, count: u32) {
        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.unread_count = count;
        }
    }

    /// Mark every message addressed to self in the conversation as read.
    ///
    /// Returns the ids that transitioned from unread to read, in list order.
    pub fn mark_incoming_read(&mut self, conversation_id: &ConversationId) -> Vec<MessageId> {
        let self_id = self.self_id.clone();
        let newly_read: Vec<MessageId> = self
            .messages
            .get_mut(conversation_id)
            .map(|list| {
                list.iter_mut()
                    .filter(|m| m.is_addressed_to(&self_id))
                    .filter_map(|m| m.mark_read().then(|| m.id.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.unread_count = 0;
        }
        self.sync_last_message_read(conversation_id);
        newly_read
    }

    /// Recompute a conversation's unread count from message flags.
    pub fn recount_unread(&mut self, conversation_id: &ConversationId) -> u32 {
        let count = self.count_unread_messages(conversation_id);
        self.set_unread_count(conversation_id, count);
        count
    }

    /// Count messages addressed to self that are still unread.
    pub fn count_unread_messages(&self, conversation_id: &ConversationId) -> u32 {
        self.get_messages(conversation_id)
            .iter()
            .filter(|m| m.is_addressed_to(&self.self_id) && !m.read)
            .count() as u32
    }

    /// Look up a conversation by id.
    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    /// Look up the direct conversation with `peer`.
    pub fn get_conversation(&self, peer: &UserId) -> Option<&Conversation> {
        self.conversations
            .get(&ConversationId::direct(&self.self_id, peer))
    }

    /// Messages of a conversation in arrival order. Empty for unknown ids.
    pub fn get_messages(&self, conversation_id: &ConversationId) -> &[Message] {
        self.messages
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All conversations, most recently updated first.
    pub fn list_conversations(&self) -> Vec<&Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.conversations.get(id))
            .collect()
    }

    /// Sum of unread counts across all conversations.
    pub fn total_unread_count(&self) -> u32 {
        self.conversations.values().map(|c| c.unread_count).sum()
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// True if there are no conversations.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Re-derive `last_message`/`updated_at` from the stored messages.
    fn refresh_last_message(&mut self, conversation_id: &ConversationId) {
        // max_by returns the last maximum, which is the later arrival on ties
        let latest = self
            .get_messages(conversation_id)
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned();
        if let (Some(latest), Some(conversation)) =
            (latest, self.conversations.get_mut(conversation_id))
        {
            conversation.updated_at = latest.created_at;
            conversation.last_message = Some(latest);
        }
    }

    /// Copy the stored read flag onto the summary's last message.
    fn sync_last_message_read(&mut self, conversation_id: &ConversationId) {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            return;
        };
        let Some(last) = conversation.last_message.as_mut() else {
            return;
        };
        let read = self
            .messages
            .get(conversation_id)
            .and_then(|list| list.iter().find(|m| m.id == last.id))
            .is_some_and(|m| m.read);
        if read {
            last.read = true;
        }
    }

    fn reorder(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        // sort_by is stable: equal timestamps keep their relative order
        order.sort_by(|a, b| {
            let a = self.conversations.get(a).map(|c| c.updated_at);
            let b = self.conversations.get(b).map(|c| c.updated_at);
            b.cmp(&a)
        });
        self.order = order;
    }
}
