//! CLI command implementations.

pub mod conversations;
pub mod listen;
pub mod send;

use chat_client::{ChatClient, Config, HttpBackingStore, WebSocketTransport};
use chat_types::{Conversation, UserId};

/// Build a client over the WebSocket transport.
pub fn websocket_client(config: &Config, user: UserId) -> ChatClient<WebSocketTransport> {
    ChatClient::new(user, WebSocketTransport::new(), config)
}

/// REST backing store from the `[server]` section.
pub fn backing_store(config: &Config) -> HttpBackingStore {
    HttpBackingStore::new(
        config.server.api_url.clone(),
        config.server.auth_token.clone(),
    )
}

/// One-line summary of a conversation from `me`'s point of view.
pub fn describe(conversation: &Conversation, me: &UserId) -> String {
    let peer = conversation
        .peer_of(me)
        .map_or_else(|| "?".to_string(), ToString::to_string);
    let last = conversation
        .last_message
        .as_ref()
        .map_or("", |m| m.text.as_str());
    format!(
        "{:<16} unread: {:<3} {}  {}",
        peer,
        conversation.unread_count,
        conversation.updated_at.format("%Y-%m-%d %H:%M"),
        last
    )
}
