//! Connection state machine — peer address and session state, no I/O.
//!
//! The [`Controller`](crate::controller::Controller) asks [`Connection`] what
//! to do ([`ConnectStep`]), performs the `get_config` exchange itself, and
//! reports the outcome back through [`Connection::finish_connect`]. Each
//! attempt carries an id; `disconnect` and peer changes retire it, so a reply
//! that arrives late is never mistaken for a newer attempt's.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Last connect attempt failed; behaves as disconnected for syncing.
    Error(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// What a `connect` call should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStep {
    /// Was connected and no target was given: now disconnected, no I/O.
    Toggled,
    /// Another attempt is already running.
    Busy,
    /// Query this address for its configuration, as attempt `id`.
    Query(String, u64),
}

#[derive(Debug, Clone)]
pub struct Connection {
    peer: String,
    state: ConnectionState,
    attempt: u64,
}

impl Connection {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` while attempt `id` is the one in progress.
    pub fn is_pending(&self, id: u64) -> bool {
        self.state == ConnectionState::Connecting && self.attempt == id
    }

    /// Start a connect attempt.
    ///
    /// - Connected and `target` is `None`: toggles to `Disconnected`.
    /// - Already `Connecting`: `Busy`, state unchanged.
    /// - Otherwise: `Connecting`; a `target` also becomes the peer.
    pub fn begin_connect(&mut self, target: Option<&str>) -> ConnectStep {
        if self.state == ConnectionState::Connecting {
            return ConnectStep::Busy;
        }
        let Some(target) = target else {
            if self.is_connected() {
                self.state = ConnectionState::Disconnected;
                return ConnectStep::Toggled;
            }
            return self.query();
        };
        self.peer = target.trim().to_string();
        self.query()
    }

    fn query(&mut self) -> ConnectStep {
        self.attempt += 1;
        self.state = ConnectionState::Connecting;
        ConnectStep::Query(self.peer.clone(), self.attempt)
    }

    /// Record the outcome of the exchange started by [`begin_connect`](Self::begin_connect).
    ///
    /// Ignored unless attempt `id` is still the one in progress: a disconnect
    /// or peer change while the query was out has already retired it.
    pub fn finish_connect(&mut self, id: u64, outcome: Result<(), String>) -> &ConnectionState {
        if self.is_pending(id) {
            self.state = match outcome {
                Ok(()) => ConnectionState::Connected,
                Err(e) => ConnectionState::Error(e),
            };
        }
        &self.state
    }

    pub fn disconnect(&mut self) {
        self.attempt += 1;
        self.state = ConnectionState::Disconnected;
    }

    /// Change the peer address. Returns `true` if this dropped a live or
    /// pending session, since the new address has not been verified.
    pub fn set_peer(&mut self, peer: &str) -> bool {
        let peer = peer.trim();
        if peer == self.peer {
            return false;
        }
        self.peer = peer.to_string();
        let invalidated = matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        );
        if invalidated {
            self.attempt += 1;
            self.state = ConnectionState::Disconnected;
        }
        invalidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(peer: &str) -> Connection {
        let mut c = Connection::new(peer);
        assert_eq!(c.begin_connect(None), ConnectStep::Query(peer.into(), 1));
        c.finish_connect(1, Ok(()));
        assert!(c.is_connected());
        c
    }

    #[test]
    fn initial_state_is_disconnected() {
        let c = Connection::new("10.0.0.2");
        assert_eq!(c.state(), &ConnectionState::Disconnected);
        assert_eq!(c.peer(), "10.0.0.2");
    }

    #[test]
    fn connect_from_disconnected_queries_peer() {
        let mut c = Connection::new("10.0.0.2");
        assert_eq!(c.begin_connect(None), ConnectStep::Query("10.0.0.2".into(), 1));
        assert_eq!(c.state(), &ConnectionState::Connecting);
    }

    #[test]
    fn connect_when_connected_toggles_off() {
        let mut c = connected("10.0.0.2");
        assert_eq!(c.begin_connect(None), ConnectStep::Toggled);
        assert_eq!(c.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn connect_with_target_when_connected_reconnects() {
        let mut c = connected("10.0.0.2");
        assert_eq!(
            c.begin_connect(Some("10.0.0.9")),
            ConnectStep::Query("10.0.0.9".into(), 2)
        );
        assert_eq!(c.peer(), "10.0.0.9");
        assert_eq!(c.state(), &ConnectionState::Connecting);
    }

    #[test]
    fn overlapping_connect_is_busy() {
        let mut c = Connection::new("10.0.0.2");
        c.begin_connect(None);
        assert_eq!(c.begin_connect(None), ConnectStep::Busy);
        assert_eq!(c.begin_connect(Some("10.0.0.3")), ConnectStep::Busy);
        assert_eq!(c.peer(), "10.0.0.2");
    }

    #[test]
    fn failure_moves_to_error() {
        let mut c = Connection::new("10.0.0.2");
        c.begin_connect(None);
        c.finish_connect(1, Err("No reply within 3.0s".into()));
        assert_eq!(
            c.state(),
            &ConnectionState::Error("No reply within 3.0s".into())
        );
        assert!(!c.is_connected());
    }

    #[test]
    fn connect_from_error_retries() {
        let mut c = Connection::new("10.0.0.2");
        c.begin_connect(None);
        c.finish_connect(1, Err("x".into()));
        assert_eq!(c.begin_connect(None), ConnectStep::Query("10.0.0.2".into(), 2));
    }

    #[test]
    fn disconnect_from_any_state() {
        let mut c = connected("10.0.0.2");
        c.disconnect();
        assert_eq!(c.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn peer_change_while_connected_disconnects() {
        let mut c = connected("10.0.0.2");
        assert!(c.set_peer("10.0.0.3"));
        assert_eq!(c.state(), &ConnectionState::Disconnected);
        assert_eq!(c.peer(), "10.0.0.3");
    }

    #[test]
    fn same_peer_is_not_a_change() {
        let mut c = connected("10.0.0.2");
        assert!(!c.set_peer(" 10.0.0.2 "));
        assert!(c.is_connected());
    }

    #[test]
    fn peer_change_during_connect_discards_late_result() {
        let mut c = Connection::new("10.0.0.2");
        c.begin_connect(None);
        assert!(c.set_peer("10.0.0.3"));
        c.finish_connect(1, Ok(()));
        assert_eq!(c.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn reconnect_after_disconnect_retires_old_attempt() {
        let mut c = Connection::new("10.0.0.2");
        assert_eq!(c.begin_connect(None), ConnectStep::Query("10.0.0.2".into(), 1));
        c.disconnect();
        assert_eq!(c.begin_connect(None), ConnectStep::Query("10.0.0.2".into(), 3));
        assert!(!c.is_pending(1));

        // The first attempt's reply lands while the second is still out.
        c.finish_connect(1, Ok(()));
        assert_eq!(c.state(), &ConnectionState::Connecting);

        c.finish_connect(3, Ok(()));
        assert!(c.is_connected());
    }

    #[test]
    fn peer_change_while_disconnected_is_silent() {
        let mut c = Connection::new("10.0.0.2");
        assert!(!c.set_peer("10.0.0.3"));
        assert_eq!(c.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn display_states() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Error("timeout".into()).to_string(),
            "error: timeout"
        );
    }
}
