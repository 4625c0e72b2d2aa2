//! Mock transport for testing.
//!
//! Captures sent frames and lets tests push inbound frames or drop the
//! connection. Unlike a request/response mock, `recv()` waits for the next
//! pushed frame, which is how a live event stream behaves.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::lock;

/// Mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wake: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_url: Option<String>,
    connect_attempts: usize,
    sent_frames: Vec<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
    refuse_connections: bool,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a frame to the next `recv()` call.
    pub fn push_inbound(&self, frame: Vec<u8>) {
        lock(&self.inner).inbound.push_back(frame);
        self.wake.notify_one();
    }

    /// Simulate the server going away. A pending `recv()` returns
    /// [`TransportError::ConnectionClosed`].
    pub fn drop_connection(&self) {
        lock(&self.inner).connected = false;
        self.wake.notify_one();
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.inner).sent_frames.clone()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        lock(&self.inner).sent_frames.last().cloned()
    }

    /// Forget captured frames.
    pub fn clear_sent(&self) {
        lock(&self.inner).sent_frames.clear();
    }

    /// Get the URL of the most recent successful connect.
    pub fn connected_url(&self) -> Option<String> {
        lock(&self.inner).connected_url.clone()
    }

    /// Number of `connect()` calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        lock(&self.inner).connect_attempts
    }

    /// Make every `connect()` fail until turned off again.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.inner).refuse_connections = refuse;
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wake: Arc::clone(&self.wake),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);
        inner.connect_attempts += 1;

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }
        if inner.refuse_connections {
            return Err(TransportError::ConnectionFailed("connection refused".into()));
        }

        inner.connected = true;
        inner.connected_url = Some(url.to_string());
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(frame.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            {
                let mut inner = lock(&self.inner);
                if !inner.connected {
                    return Err(TransportError::ConnectionClosed);
                }
                if let Some(frame) = inner.inbound.pop_front() {
                    return Ok(frame);
                }
            }
            self.wake.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        lock(&self.inner).connected = false;
        self.wake.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://test/ws?userId=u1").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(
            transport.connected_url(),
            Some("ws://test/ws?userId=u1".to_string())
        );
        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn mock_transport_captures_sent_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.send(b"frame 1").await.unwrap();
        transport.send(b"frame 2").await.unwrap();

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"frame 1");
        assert_eq!(transport.last_sent(), Some(b"frame 2".to_vec()));
    }

    #[tokio::test]
    async fn recv_returns_frames_in_push_order() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.push_inbound(b"first".to_vec());
        transport.push_inbound(b"second".to_vec());

        assert_eq!(transport.recv().await.unwrap(), b"first");
        assert_eq!(transport.recv().await.unwrap(), b"second");
    }

    #[tokio::test(start_paused = true)]
    async fn recv_waits_for_pushed_frame() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let pusher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            pusher.push_inbound(b"late".to_vec());
        });

        assert_eq!(transport.recv().await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn drop_connection_wakes_pending_recv() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let reader = transport.clone();
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::task::yield_now().await;
        transport.drop_connection();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let transport = MockTransport::new();
        transport.fail_next_connect("network unreachable");

        let result = transport.connect("ws://test").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());

        transport.connect("ws://test").await.unwrap();
        assert_eq!(transport.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn refused_connections_keep_failing() {
        let transport = MockTransport::new();
        transport.refuse_connections(true);

        for _ in 0..3 {
            assert!(transport.connect("ws://test").await.is_err());
        }
        transport.refuse_connections(false);
        assert!(transport.connect("ws://test").await.is_ok());
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.fail_next_send("buffer full");

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        transport.send(b"data").await.unwrap();
        assert_eq!(transport.sent_frames().len(), 1);
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.connect("ws://test").await.unwrap();
        assert!(transport2.is_connected());

        transport1.send(b"from t1").await.unwrap();
        transport2.send(b"from t2").await.unwrap();
        assert_eq!(transport1.sent_frames().len(), 2);

        transport2.clear_sent();
        assert!(transport1.sent_frames().is_empty());
    }
}
