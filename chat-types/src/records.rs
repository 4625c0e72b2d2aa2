//! Conversation summaries served by the REST backend for cold-start hydration.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::{Message, UserId};

/// A participant as embedded in a REST conversation payload.
///
/// Only the id is used; profile fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParticipantRecord {
    /// Participant identity
    pub id: UserId,
}

/// A conversation as returned by `GET /conversations`.
///
/// The backend's own id is kept only to fetch the message list; locally
/// the conversation is re-keyed by its derived direct id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Backend conversation id
    #[serde(deserialize_with = "crate::ids::opaque_string")]
    pub id: String,
    /// Embedded participant objects
    #[serde(default)]
    pub participants: Vec<ParticipantRecord>,
    /// Participant ids, for backends that send ids only
    #[serde(default)]
    pub participant_ids: Vec<UserId>,
    /// Latest message known to the backend
    #[serde(default)]
    pub last_message: Option<Message>,
    /// Backend unread count (advisory; recomputed locally)
    #[serde(default)]
    pub unread_count: u32,
    /// Backend update instant
    #[serde(default, deserialize_with = "crate::message::optional_instant")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// All participant ids from either representation.
    pub fn participant_set(&self) -> BTreeSet<UserId> {
        self.participants
            .iter()
            .map(|p| p.id.clone())
            .chain(self.participant_ids.iter().cloned())
            .collect()
    }

    /// The participant that is not `me`, if this is a direct conversation.
    pub fn peer_of(&self, me: &UserId) -> Option<UserId> {
        let participants = self.participant_set();
        if participants.len() != 2 || !participants.contains(me) {
            return None;
        }
        participants.into_iter().find(|p| p != me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_embedded_participants() {
        let json = r#"{
            "id": 3,
            "participants": [{"id": "u1", "username": "me"}, {"id": "u2", "avatar": "x.png"}],
            "unreadCount": 1,
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "3");
        assert_eq!(record.peer_of(&"u1".into()), Some(UserId::from("u2")));
    }

    #[test]
    fn decodes_backend_local_times() {
        let json = r#"{
            "id": 4,
            "participantIds": ["u1", "u2"],
            "lastMessage": {"id": 9, "senderId": "u2", "receiverId": "u1", "text": "hey",
                            "timestamp": "2024-05-01T10:00:00.123", "read": null, "type": "TEXT"},
            "updatedAt": "2024-05-01T10:00:00"
        }"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        let last = record.last_message.unwrap();
        assert!(!last.read);
        assert_eq!(last.created_at.timestamp(), record.updated_at.unwrap().timestamp());
    }

    #[test]
    fn decodes_participant_ids() {
        let json = r#"{"id": "conv1", "participantIds": ["u1", "u5"]}"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.participant_set().len(), 2);
        assert!(record.last_message.is_none());
    }

    #[test]
    fn group_record_has_no_direct_peer() {
        let json = r#"{"id": "g", "participantIds": ["u1", "u2", "u3"]}"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.peer_of(&"u1".into()), None);
    }

    #[test]
    fn record_without_me_has_no_peer() {
        let json = r#"{"id": "x", "participantIds": ["u2", "u3"]}"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.peer_of(&"u1".into()), None);
    }
}
