//! Per-connection state machine (specification §4.5):
//!
//! `INIT -> GREETED -> REQUESTED -> { RELAYING | UDP-ASSOCIATED | CLOSED }`
//!
//! The control flow in [`crate::server`] already enforces these transitions
//! structurally (each stage consumes the previous one's return value), so
//! this type exists to give the state a name for logging and tests rather
//! than to gate behavior at runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Greeted,
    Requested,
    Relaying,
    UdpAssociated,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Init => "INIT",
            ConnectionState::Greeted => "GREETED",
            ConnectionState::Requested => "REQUESTED",
            ConnectionState::Relaying => "RELAYING",
            ConnectionState::UdpAssociated => "UDP-ASSOCIATED",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Tracks the current state and logs each transition at `debug` level.
pub struct StateTracker {
    peer: std::net::SocketAddr,
    current: ConnectionState,
}

impl StateTracker {
    pub fn new(peer: std::net::SocketAddr) -> StateTracker {
        StateTracker {
            peer,
            current: ConnectionState::Init,
        }
    }

    pub fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(peer = %self.peer, from = %self.current, to = %next, "socks state transition");
        self.current = next;
    }

    pub fn current(&self) -> ConnectionState {
        self.current
    }
}
