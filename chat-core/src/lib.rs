//! # chat-core
//!
//! Pure conversation sync logic for chatsync (no I/O, instant tests).
//!
//! This crate implements the store, merge rules and state machines for
//! conversation sync without any network I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (socket, REST, timers) is performed by `chat-client`, which
//! interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod merge;
pub mod presence;
pub mod state;
pub mod store;
pub mod typing;

pub use merge::{apply_hydration, apply_message, MergeOutcome};
pub use presence::PresenceBook;
pub use state::{Action, ConnectionEvent, ConnectionState, Event, ReconnectPolicy};
pub use store::{AppendOutcome, ConversationStore};
pub use typing::{TypingAction, TypingDriver, TypingInput, DEFAULT_QUIET_PERIOD};
