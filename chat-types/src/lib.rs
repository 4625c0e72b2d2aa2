//! # chat-types
//!
//! Identity, message and wire event types for chatsync.
//!
//! This crate provides the foundational types used across all chatsync crates:
//! - [`UserId`], [`MessageId`], [`ConversationId`] - Identity types
//! - [`Message`], [`Conversation`] - The conversation model
//! - [`InboundEvent`], [`OutboundEvent`] - Events carried on the live stream
//! - [`ConversationRecord`] - Conversation summaries served by the REST backend
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod message;
mod records;

pub use error::WireError;
pub use events::{
    EventKind, InboundEvent, OnlineStatus, OutboundEvent, ReadReceipt, TypingNotice,
    TypingSignal,
};
pub use ids::{ConversationId, MessageId, UserId};
pub use message::{Conversation, Message, MessageKind};
pub use records::{ConversationRecord, ParticipantRecord};
