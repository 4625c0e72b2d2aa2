//! # chat-client
//!
//! Client library for chatsync real-time conversation sync.
//!
//! This is the library applications embed to keep a local conversation
//! store in step with a live event stream.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Local-first Store**: Optimistic sends, set-union merge by message id
//! - **Presence**: Ephemeral typing and online flags per peer
//! - **Cold-start Hydration**: REST snapshot folded into the live store
//! - **Pure State Machines**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use chat_client::{ChatClient, Config, WebSocketTransport};
//!
//! let config = Config::from_file("chatsync.toml".as_ref())?;
//! let client = ChatClient::new("u1".into(), WebSocketTransport::new(), &config);
//! client.start().await;
//!
//! client.send_message(&"u2".into(), "hi", MessageKind::Text).await?;
//! let unread = client.reader().total_unread_count();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod connector;
pub mod hydration;
pub mod presence;
pub mod store;
pub mod synchronizer;
pub mod transport;

pub use client::ChatClient;
pub use config::{Config, ConfigError};
pub use connector::{Subscription, TransportConnector};
pub use hydration::{BackingStore, HttpBackingStore, HydrationError};
pub use presence::{PresenceTracker, TypingDebouncer};
pub use store::{StoreHandle, StoreReader};
pub use synchronizer::MessageSynchronizer;
pub use transport::{MockTransport, Transport, TransportError, WebSocketTransport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a handler panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
