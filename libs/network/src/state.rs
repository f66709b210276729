//! Connection state machine
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──stream ready──► Authenticating ──auth ok──► Connected
//!      ▲                          │                              │                         │
//!      └──────── cancel / disconnect / failure (Disconnected or Error) from any state ─────┘
//! ```
//!
//! Published through a `watch` channel so observers always see the latest
//! state without polling.

use std::fmt;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Error(String),
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) | (_, Error(_)) => true,
            (Disconnected, Connecting) | (Error(_), Connecting) => true,
            (Connecting, Authenticating) => true,
            (Authenticating, Connected) => true,
            _ => false,
        }
    }

    /// Whether a session is being established or is up
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Authenticating | ConnectionState::Connected
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error(reason) => write!(f, "error ({})", reason),
        }
    }
}

/// Owner of the current state and its watch channel
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Apply `next` if legal from the current state
    ///
    /// Returns false and leaves the state untouched otherwise. Re-entering
    /// the current state is a no-op that reports success.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|current| {
            if *current == next {
                applied = true;
                return false;
            }
            if !current.can_transition_to(&next) {
                warn!(from = %current, to = %next, "Rejected connection state transition");
                return false;
            }
            info!(from = %current, to = %next, "Connection state changed");
            *current = next.clone();
            applied = true;
            true
        });
        applied
    }
}
