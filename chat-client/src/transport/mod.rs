//! Transport abstraction for chatsync.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one encoded event frame
//! - `recv()` waits for the next event frame
//! - `close()` gracefully terminates
//!
//! `send` and `recv` may run concurrently: the connector's reader task sits
//! in `recv` while application code publishes.

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Transport trait for exchanging event frames with the server.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the given URL, replacing any previous connection.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Send one frame over the connection.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Waits until a frame is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
