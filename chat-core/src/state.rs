//! Connection state machine for chatsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of the single live connection. The state machine takes events
//! as input and produces a new state plus a list of actions to execute.
//!
//! Reconnection uses a bounded attempt count with a fixed delay. Once the
//! attempts are exhausted the machine parks in [`ConnectionState::Failed`],
//! which callers observe simply as "not connected". Nothing is replayed on
//! reconnect; gap-filling is the caller's job via REST hydration.
//!
//! The actual I/O is performed by chat-client, not by this module.

use chat_types::UserId;
use std::time::Duration;

/// Reconnection policy: bounded attempts, fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts after a loss or failed connect.
    pub max_attempts: u32,
    /// Delay before each attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none wanted.
    Disconnected,
    /// First connection attempt in progress.
    Connecting {
        /// Identity the connection is bound to.
        identity: UserId,
    },
    /// Live.
    Connected {
        /// Identity the connection is bound to.
        identity: UserId,
    },
    /// Lost or failed, retrying.
    Reconnecting {
        /// Identity the connection is bound to.
        identity: UserId,
        /// Current attempt, starting at 1.
        attempt: u32,
    },
    /// Retries exhausted.
    Failed {
        /// Identity the connection was bound to.
        identity: UserId,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event, policy: &ReconnectPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // Connect requests
            (Self::Disconnected | Self::Failed { .. }, Event::ConnectRequested { identity }) => (
                Self::Connecting {
                    identity: identity.clone(),
                },
                vec![Action::Connect { identity }],
            ),
            (Self::Connected { identity: current }, Event::ConnectRequested { identity })
                if current == identity =>
            {
                (Self::Connected { identity: current }, vec![])
            }
            (Self::Connected { identity: current }, Event::ConnectRequested { identity }) => (
                Self::Connecting {
                    identity: identity.clone(),
                },
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected {
                        identity: current,
                        reason: "identity changed".into(),
                    }),
                    Action::Connect { identity },
                ],
            ),
            (Self::Connecting { identity: current }, Event::ConnectRequested { identity })
                if current == identity =>
            {
                (Self::Connecting { identity }, vec![])
            }
            (
                Self::Reconnecting {
                    identity: current,
                    attempt,
                },
                Event::ConnectRequested { identity },
            ) if current == identity => (Self::Reconnecting { identity, attempt }, vec![]),
            (
                Self::Connecting { .. } | Self::Reconnecting { .. },
                Event::ConnectRequested { identity },
            ) => (
                Self::Connecting {
                    identity: identity.clone(),
                },
                vec![
                    Action::CancelReconnect,
                    Action::Disconnect,
                    Action::Connect { identity },
                ],
            ),

            // From Connecting
            (Self::Connecting { identity }, Event::ConnectSucceeded) => (
                Self::Connected {
                    identity: identity.clone(),
                },
                vec![Action::EmitEvent(ConnectionEvent::Connected { identity })],
            ),
            (Self::Connecting { identity }, Event::ConnectFailed { error }) => {
                schedule_retry(identity, 1, error, policy)
            }

            // From Connected
            (Self::Connected { identity }, Event::ConnectionLost { reason }) => {
                let (state, mut actions) = schedule_retry(identity.clone(), 1, reason.clone(), policy);
                actions.insert(
                    0,
                    Action::EmitEvent(ConnectionEvent::Disconnected { identity, reason }),
                );
                (state, actions)
            }

            // From Reconnecting
            (Self::Reconnecting { identity, attempt }, Event::ReconnectTimer) => (
                Self::Reconnecting {
                    identity: identity.clone(),
                    attempt,
                },
                vec![Action::Connect { identity }],
            ),
            (Self::Reconnecting { identity, .. }, Event::ConnectSucceeded) => (
                Self::Connected {
                    identity: identity.clone(),
                },
                vec![Action::EmitEvent(ConnectionEvent::Connected { identity })],
            ),
            (Self::Reconnecting { identity, attempt }, Event::ConnectFailed { error }) => {
                schedule_retry(identity, attempt.saturating_add(1), error, policy)
            }

            // Disconnect requests are safe from every state
            (Self::Connected { identity }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected {
                        identity,
                        reason: "client requested".into(),
                    }),
                ],
            ),
            (Self::Connecting { .. }, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![Action::Disconnect])
            }
            (Self::Reconnecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![Action::CancelReconnect, Action::Disconnect],
            ),
            (Self::Disconnected | Self::Failed { .. }, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if currently trying to connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }

    /// Check if reconnection was given up.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Identity the connection is (or was last) bound to.
    pub fn identity(&self) -> Option<&UserId> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { identity }
            | Self::Connected { identity }
            | Self::Reconnecting { identity, .. }
            | Self::Failed { identity } => Some(identity),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Either schedule attempt number `attempt` or give up.
fn schedule_retry(
    identity: UserId,
    attempt: u32,
    error: String,
    policy: &ReconnectPolicy,
) -> (ConnectionState, Vec<Action>) {
    if attempt > policy.max_attempts {
        let attempts = policy.max_attempts;
        return (
            ConnectionState::Failed {
                identity: identity.clone(),
            },
            vec![Action::EmitEvent(ConnectionEvent::GaveUp {
                identity,
                attempts,
                error,
            })],
        );
    }
    (
        ConnectionState::Reconnecting { identity, attempt },
        vec![
            Action::EmitEvent(ConnectionEvent::Retrying { attempt, error }),
            Action::StartReconnectTimer {
                delay: policy.delay,
            },
        ],
    )
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked for a connection bound to `identity`.
    ConnectRequested {
        /// Identity to bind.
        identity: UserId,
    },
    /// Transport connection succeeded.
    ConnectSucceeded,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Live connection dropped.
    ConnectionLost {
        /// Reason for disconnection.
        reason: String,
    },
    /// Caller asked to tear down.
    DisconnectRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions to be executed by the chat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the transport for `identity`.
    Connect {
        /// Identity to put in the connection query.
        identity: UserId,
    },
    /// Close the transport.
    Disconnect,
    /// Start a timer for reconnection.
    StartReconnectTimer {
        /// Delay before attempting reconnection.
        delay: Duration,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Report to the application.
    EmitEvent(ConnectionEvent),
}

/// Lifecycle notifications for the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection is live.
    Connected {
        /// Bound identity.
        identity: UserId,
    },
    /// Connection went away.
    Disconnected {
        /// Identity that was bound.
        identity: UserId,
        /// Reason for disconnection.
        reason: String,
    },
    /// A reconnection attempt is scheduled.
    Retrying {
        /// Which attempt is scheduled.
        attempt: u32,
        /// Error that caused the retry.
        error: String,
    },
    /// Retries exhausted.
    GaveUp {
        /// Identity that was bound.
        identity: UserId,
        /// Attempts made.
        attempts: u32,
        /// Last error.
        error: String,
    },
}
