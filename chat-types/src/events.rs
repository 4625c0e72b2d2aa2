//! Events carried on the live bidirectional stream.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Outbound and inbound catalogues are disjoint types so a client can never
//! publish an inbound-only event or subscribe to an outbound-only one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Message, MessageId, UserId, WireError};

/// Events published by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Deliver a message to its receiver
    SendMessage(Message),
    /// Ephemeral typing signal
    Typing(TypingNotice),
    /// Read receipt for one message
    MarkRead(ReadReceipt),
}

/// Events delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A new message arrived
    Message(Message),
    /// A peer's typing state changed
    Typing(TypingSignal),
    /// A peer's presence changed
    OnlineStatus(OnlineStatus),
}

/// Subscribable inbound event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `message`
    Message,
    /// `typing`
    Typing,
    /// `online_status`
    OnlineStatus,
}

impl EventKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Typing => "typing",
            EventKind::OnlineStatus => "online_status",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound typing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// Peer that should see the indicator
    pub receiver_id: UserId,
    /// New typing state
    pub is_typing: bool,
}

/// Outbound read receipt payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Message that was read
    pub message_id: MessageId,
}

/// Inbound typing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    /// Peer whose state changed
    pub user_id: UserId,
    /// New typing state
    pub is_typing: bool,
}

/// Inbound presence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatus {
    /// Peer whose presence changed
    pub user_id: UserId,
    /// New presence state
    pub is_online: bool,
}

/// Envelope shape used to classify a frame before decoding its payload.
#[derive(Deserialize)]
struct RawFrame {
    event: String,
}

fn decode_frame<E>(bytes: &[u8], known: &[&str]) -> Result<E, WireError>
where
    E: for<'de> Deserialize<'de>,
{
    let raw: RawFrame = serde_json::from_slice(bytes).map_err(WireError::Malformed)?;
    if !known.contains(&raw.event.as_str()) {
        return Err(WireError::UnknownEvent(raw.event));
    }
    serde_json::from_slice(bytes).map_err(|source| WireError::InvalidPayload {
        event: raw.event,
        source,
    })
}

impl OutboundEvent {
    const NAMES: [&'static str; 3] = ["send_message", "typing", "mark_read"];

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SendMessage(_) => "send_message",
            OutboundEvent::Typing(_) => "typing",
            OutboundEvent::MarkRead(_) => "mark_read",
        }
    }

    /// Encode as a JSON frame.
    pub fn to_frame(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Decode a JSON frame.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, WireError> {
        decode_frame(bytes, &Self::NAMES)
    }
}

impl InboundEvent {
    const NAMES: [&'static str; 3] = ["message", "typing", "online_status"];

    /// Kind used for subscription routing.
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Message(_) => EventKind::Message,
            InboundEvent::Typing(_) => EventKind::Typing,
            InboundEvent::OnlineStatus(_) => EventKind::OnlineStatus,
        }
    }

    /// Encode as a JSON frame.
    pub fn to_frame(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Decode and validate a JSON frame.
    ///
    /// Message payloads that decode but have empty or self-addressed
    /// participants are rejected here so nothing downstream sees them.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, WireError> {
        let event: Self = decode_frame(bytes, &Self::NAMES)?;
        match &event {
            InboundEvent::Message(message) => message.validate()?,
            InboundEvent::Typing(signal) if signal.user_id.is_empty() => {
                return Err(WireError::InvalidMessage("typing event without userId".into()))
            }
            InboundEvent::OnlineStatus(status) if status.user_id.is_empty() => {
                return Err(WireError::InvalidMessage(
                    "online_status event without userId".into(),
                ))
            }
            _ => {}
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageKind;
    use chrono::{TimeZone, Utc};

    fn sample_message() -> Message {
        Message {
            id: "m1".into(),
            sender_id: "u2".into(),
            receiver_id: "u1".into(),
            text: "yo".into(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            read: false,
            kind: MessageKind::Text,
        }
    }

    // ===========================================
    // Envelope Tests
    // ===========================================

    #[test]
    fn outbound_envelope_shape() {
        let event = OutboundEvent::Typing(TypingNotice {
            receiver_id: "u2".into(),
            is_typing: true,
        });
        let json: serde_json::Value = serde_json::from_slice(&event.to_frame().unwrap()).unwrap();
        assert_eq!(json["event"], "typing");
        assert_eq!(json["data"]["receiverId"], "u2");
        assert_eq!(json["data"]["isTyping"], true);
    }

    #[test]
    fn mark_read_envelope_shape() {
        let event = OutboundEvent::MarkRead(ReadReceipt {
            message_id: "m9".into(),
        });
        assert_eq!(event.name(), "mark_read");
        let json: serde_json::Value = serde_json::from_slice(&event.to_frame().unwrap()).unwrap();
        assert_eq!(json["data"]["messageId"], "m9");
    }

    #[test]
    fn inbound_decodes_online_status() {
        let frame = br#"{"event":"online_status","data":{"userId":"u2","isOnline":true}}"#;
        let event = InboundEvent::from_frame(frame).unwrap();
        assert_eq!(event.kind(), EventKind::OnlineStatus);
        assert_eq!(
            event,
            InboundEvent::OnlineStatus(OnlineStatus {
                user_id: "u2".into(),
                is_online: true
            })
        );
    }

    #[test]
    fn inbound_message_survives_encode_decode() {
        let event = InboundEvent::Message(sample_message());
        let decoded = InboundEvent::from_frame(&event.to_frame().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    // ===========================================
    // Malformed Input Tests
    // ===========================================

    #[test]
    fn garbage_is_malformed() {
        let result = InboundEvent::from_frame(b"not json");
        assert!(matches!(result, Err(WireError::Malformed(_))));
    }

    #[test]
    fn outbound_name_is_unknown_inbound() {
        let frame = br#"{"event":"send_message","data":{}}"#;
        let result = InboundEvent::from_frame(frame);
        assert!(matches!(result, Err(WireError::UnknownEvent(name)) if name == "send_message"));
    }

    #[test]
    fn missing_field_is_invalid_payload() {
        let frame = br#"{"event":"typing","data":{"userId":"u2"}}"#;
        let result = InboundEvent::from_frame(frame);
        assert!(matches!(result, Err(WireError::InvalidPayload { event, .. }) if event == "typing"));
    }

    #[test]
    fn self_addressed_message_is_rejected() {
        let mut msg = sample_message();
        msg.receiver_id = msg.sender_id.clone();
        let frame = InboundEvent::Message(msg).to_frame().unwrap();
        assert!(matches!(
            InboundEvent::from_frame(&frame),
            Err(WireError::InvalidMessage(_))
        ));
    }

    #[test]
    fn empty_typing_user_is_rejected() {
        let frame = br#"{"event":"typing","data":{"userId":"","isTyping":true}}"#;
        assert!(InboundEvent::from_frame(frame).is_err());
    }
}
