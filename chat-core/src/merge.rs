//! Merge rules for turning message events into store mutations.
//!
//! [`apply_message`] is the single entry point for both optimistic local
//! sends and messages received from the live stream, so both paths share
//! identical merge semantics. [`apply_hydration`] folds a REST snapshot into
//! the store by set union on message id.

use chat_types::{Conversation, ConversationId, ConversationRecord, Message};

use crate::store::{AppendOutcome, ConversationStore};

/// What [`apply_message`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Appended to an existing conversation.
    Appended {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Whether the conversation's unread count was incremented.
        counted_unread: bool,
    },
    /// Created a new conversation for it.
    Created {
        /// The new conversation.
        conversation_id: ConversationId,
        /// Whether the conversation's unread count was incremented.
        counted_unread: bool,
    },
    /// Already present (e.g. the echo of an optimistic send).
    Duplicate {
        /// Conversation holding the first copy.
        conversation_id: ConversationId,
    },
    /// Neither sender nor receiver is the local identity.
    Foreign,
    /// Fails [`Message::validate`]: empty id or participant, or self-addressed.
    Invalid,
}

impl MergeOutcome {
    /// The affected conversation, if any.
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            MergeOutcome::Appended { conversation_id, .. }
            | MergeOutcome::Created { conversation_id, .. }
            | MergeOutcome::Duplicate { conversation_id } => Some(conversation_id),
            MergeOutcome::Foreign | MergeOutcome::Invalid => None,
        }
    }
}

/// Merge one message into the store.
///
/// The conversation id is derived from `{sender, receiver}`. The unread count
/// grows by one only when the message is addressed to self and unread, so
/// self-sent messages and their echoes never count.
pub fn apply_message(store: &mut ConversationStore, message: Message) -> MergeOutcome {
    if message.validate().is_err() {
        return MergeOutcome::Invalid;
    }
    if !message.involves(store.self_id()) {
        return MergeOutcome::Foreign;
    }
    let conversation_id = message.conversation_id();
    let counts = message.is_addressed_to(store.self_id()) && !message.read;

    let outcome = store.append_message(&conversation_id, message);
    if outcome == AppendOutcome::Duplicate {
        // the duplicate may have carried a read flag
        store.recount_unread(&conversation_id);
        return MergeOutcome::Duplicate { conversation_id };
    }

    if counts {
        let current = store
            .conversation(&conversation_id)
            .map_or(0, |c| c.unread_count);
        store.set_unread_count(&conversation_id, current.saturating_add(1));
    }

    match outcome {
        AppendOutcome::Created => MergeOutcome::Created {
            conversation_id,
            counted_unread: counts,
        },
        _ => MergeOutcome::Appended {
            conversation_id,
            counted_unread: counts,
        },
    }
}

/// Fold one REST conversation and its messages into the store.
///
/// The conversation is re-keyed by its derived direct id. Messages already
/// present (by id) are kept, unread is recounted from message flags so the
/// store's invariants hold regardless of what the backend reported.
/// Returns `None` for records that are not a direct conversation with self.
pub fn apply_hydration(
    store: &mut ConversationStore,
    record: &ConversationRecord,
    messages: Vec<Message>,
) -> Option<ConversationId> {
    let me = store.self_id().clone();
    let peer = record.peer_of(&me)?;
    let conversation_id = ConversationId::direct(&me, &peer);

    if store.conversation(&conversation_id).is_none() {
        store.upsert_conversation(Conversation::direct(
            me.clone(),
            peer,
            record.updated_at.unwrap_or_default(),
        ));
    }

    for message in record.last_message.iter().cloned().chain(messages) {
        if message.validate().is_ok() && message.conversation_id() == conversation_id {
            store.append_message(&conversation_id, message);
        }
    }
    store.recount_unread(&conversation_id);
    Some(conversation_id)
}
