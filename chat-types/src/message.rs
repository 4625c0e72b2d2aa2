//! The conversation model: messages and conversation summaries.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::{ConversationId, MessageId, UserId, WireError};

/// Parse an instant as RFC 3339, or as an offset-less local time taken as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub(crate) fn optional_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_instant(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
        None => Ok(None),
    }
}

/// A missing or null read flag means unread.
fn read_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Content kind of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    #[serde(alias = "TEXT")]
    Text,
    /// Image reference carried in `text`.
    #[serde(alias = "IMAGE")]
    Image,
    /// Single emoji.
    #[serde(alias = "EMOJI")]
    Emoji,
}

/// A single direct message.
///
/// Immutable once created except for `read`, which only moves false → true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id (locally generated for optimistic sends)
    pub id: MessageId,
    /// Author
    pub sender_id: UserId,
    /// Recipient
    pub receiver_id: UserId,
    /// Body
    pub text: String,
    /// Creation instant, RFC 3339 on the wire
    #[serde(rename = "timestamp", alias = "createdAt", deserialize_with = "instant")]
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read it
    #[serde(default, deserialize_with = "read_flag")]
    pub read: bool,
    /// Content kind
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: MessageKind,
}

impl Message {
    /// Compose a new unread message stamped with the current time.
    pub fn compose(sender_id: UserId, receiver_id: UserId, text: &str, kind: MessageKind) -> Self {
        Self {
            id: MessageId::generate(),
            sender_id,
            receiver_id,
            text: text.to_string(),
            created_at: Utc::now(),
            read: false,
            kind,
        }
    }

    /// The 1:1 conversation this message belongs to.
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::direct(&self.sender_id, &self.receiver_id)
    }

    /// True if `user` is the recipient.
    pub fn is_addressed_to(&self, user: &UserId) -> bool {
        &self.receiver_id == user
    }

    /// True if `user` is the sender or the recipient.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender_id == user || &self.receiver_id == user
    }

    /// The participant that is not `user`.
    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        if &self.sender_id == user {
            Some(&self.receiver_id)
        } else if &self.receiver_id == user {
            Some(&self.sender_id)
        } else {
            None
        }
    }

    /// Set the read flag. Returns true only on a false → true transition.
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.read;
        self.read = true;
        changed
    }

    /// Reject messages that decode but cannot belong to a conversation.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.id.is_empty() {
            return Err(WireError::InvalidMessage("empty id".into()));
        }
        if self.sender_id.is_empty() || self.receiver_id.is_empty() {
            return Err(WireError::InvalidMessage(format!(
                "message {} has an empty participant",
                self.id
            )));
        }
        if self.sender_id == self.receiver_id {
            return Err(WireError::InvalidMessage(format!(
                "message {} is addressed to its own sender",
                self.id
            )));
        }
        Ok(())
    }
}

/// Summary of a conversation between two or more identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id
    pub id: ConversationId,
    /// Participants (two for direct conversations)
    pub participant_ids: BTreeSet<UserId>,
    /// Message with the greatest `created_at`
    pub last_message: Option<Message>,
    /// Messages addressed to the local identity and not yet read
    pub unread_count: u32,
    /// Equals `last_message.created_at` whenever a last message exists
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// An empty direct conversation between `a` and `b`.
    pub fn direct(a: UserId, b: UserId, updated_at: DateTime<Utc>) -> Self {
        let id = ConversationId::direct(&a, &b);
        Self {
            id,
            participant_ids: [a, b].into_iter().collect(),
            last_message: None,
            unread_count: 0,
            updated_at,
        }
    }

    /// True if `user` participates.
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participant_ids.contains(user)
    }

    /// The first participant that is not `me`.
    pub fn peer_of(&self, me: &UserId) -> Option<&UserId> {
        self.participant_ids.iter().find(|p| *p != me)
    }
}
