//! Datagram transport — trait + UDP backend.
//!
//! The core never talks to a socket directly: the sync loop, the connection
//! flow, discovery, and the network settings commit all go through
//! [`Transport`], so tests can swap in [`mock::MockTransport`].

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use crate::protocol::{DEFAULT_PORT, MAX_DATAGRAM};

// ── Error type ──

/// Transport errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"bind"`, `"send to 10.0.0.4:8888"`) and
/// *details* is the underlying OS error.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Bind(String),
    Resolve(String),
    SendFailed(String),
    ReceiveFailed(String),
    Timeout(Duration),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Bind(e) => write!(f, "Could not open UDP socket: {e}"),
            TransportError::Resolve(e) => write!(f, "Could not resolve peer: {e}"),
            TransportError::SendFailed(e) => write!(f, "Send failed: {e}"),
            TransportError::ReceiveFailed(e) => write!(f, "Receive failed: {e}"),
            TransportError::Timeout(d) => write!(f, "No reply within {:.1}s", d.as_secs_f64()),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One datagram received during a broadcast window.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub from: SocketAddr,
    pub payload: Vec<u8>,
}

// ── Trait ──

pub trait Transport: Send + Sync {
    /// Fire-and-forget datagram to `peer`. No retry, no acknowledgment.
    fn send(&self, peer: &str, payload: &[u8]) -> Result<()>;

    /// Send a datagram and wait for exactly one reply from the same peer.
    ///
    /// Datagrams from other senders are ignored. Fails with
    /// [`TransportError::Timeout`] once `timeout` has elapsed.
    fn send_and_receive(&self, peer: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>>;

    /// Broadcast a datagram on the device port and collect every reply that
    /// arrives within `window`, in arrival order.
    fn broadcast(&self, payload: &[u8], window: Duration) -> Result<Vec<Reply>>;
}

// ── UDP backend ──

/// [`Transport`] over `std::net::UdpSocket`.
///
/// Each operation binds a fresh ephemeral socket, so a stuck exchange never
/// poisons later ones.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    port: u16,
    broadcast_addr: Ipv4Addr,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

impl UdpTransport {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            broadcast_addr: Ipv4Addr::BROADCAST,
        }
    }

    /// Use a directed broadcast (or, in tests, a unicast) address for scans.
    pub fn with_broadcast_addr(mut self, addr: Ipv4Addr) -> Self {
        self.broadcast_addr = addr;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve a dotted quad or hostname on the device port, preferring IPv4.
    pub fn resolve(&self, peer: &str) -> Result<SocketAddr> {
        let peer = peer.trim();
        if peer.is_empty() {
            return Err(TransportError::Resolve("empty address".into()));
        }
        let addrs: Vec<SocketAddr> = (peer, self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve(format!("{peer}: {e}")))?
            .collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| TransportError::Resolve(format!("{peer}: no addresses")))
    }

    fn bind() -> Result<UdpSocket> {
        UdpSocket::bind("0.0.0.0:0").map_err(|e| TransportError::Bind(format!("0.0.0.0:0: {e}")))
    }

    fn send_to(socket: &UdpSocket, payload: &[u8], target: SocketAddr) -> Result<()> {
        socket
            .send_to(payload, target)
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed(format!("send to {target}: {e}")))
    }
}

/// Remaining time until `deadline`, or `None` once it has passed.
fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

impl Transport for UdpTransport {
    fn send(&self, peer: &str, payload: &[u8]) -> Result<()> {
        let target = self.resolve(peer)?;
        let socket = Self::bind()?;
        Self::send_to(&socket, payload, target)
    }

    fn send_and_receive(&self, peer: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let target = self.resolve(peer)?;
        let socket = Self::bind()?;
        Self::send_to(&socket, payload, target)?;

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let Some(left) = remaining(deadline) else {
                return Err(TransportError::Timeout(timeout));
            };
            socket
                .set_read_timeout(Some(left))
                .map_err(|e| TransportError::ReceiveFailed(format!("set timeout: {e}")))?;
            match socket.recv_from(&mut buf) {
                Ok((n, from)) if from.ip() == target.ip() => return Ok(buf[..n].to_vec()),
                Ok((_, from)) => {
                    log::debug!("ignoring datagram from {from} while waiting for {target}");
                }
                Err(e) if is_timeout(&e) => return Err(TransportError::Timeout(timeout)),
                Err(e) => {
                    return Err(TransportError::ReceiveFailed(format!(
                        "recv from {target}: {e}"
                    )));
                }
            }
        }
    }

    fn broadcast(&self, payload: &[u8], window: Duration) -> Result<Vec<Reply>> {
        let socket = Self::bind()?;
        socket
            .set_broadcast(true)
            .map_err(|e| TransportError::Bind(format!("SO_BROADCAST: {e}")))?;
        let target = SocketAddr::from((self.broadcast_addr, self.port));
        Self::send_to(&socket, payload, target)?;

        let deadline = Instant::now() + window;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut replies = Vec::new();
        while let Some(left) = remaining(deadline) {
            socket
                .set_read_timeout(Some(left))
                .map_err(|e| TransportError::ReceiveFailed(format!("set timeout: {e}")))?;
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => replies.push(Reply {
                    from,
                    payload: buf[..n].to_vec(),
                }),
                Err(e) if is_timeout(&e) => break,
                Err(e) => {
                    return Err(TransportError::ReceiveFailed(format!(
                        "recv after broadcast: {e}"
                    )));
                }
            }
        }
        Ok(replies)
    }
}

// ── Mock transport for testing ──

/// In-memory transport for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex, MutexGuard};

    #[derive(Default)]
    struct Recorded {
        /// `send` calls: (peer, payload).
        sent: Vec<(String, Vec<u8>)>,
        /// `send_and_receive` calls: (peer, payload).
        requests: Vec<(String, Vec<u8>)>,
        /// Queued answers for `send_and_receive`; empty → timeout.
        replies: VecDeque<Result<Vec<u8>>>,
        /// Queued outcomes for `send`; empty → success.
        send_outcomes: VecDeque<Result<()>>,
        /// Answer for `broadcast`.
        broadcast: Option<Result<Vec<Reply>>>,
        broadcasts: usize,
    }

    /// Transport that records every call and answers from queued responses.
    ///
    /// `hold_sends()` makes `send` block until `release_sends()`, which is how
    /// tests model a peer that never completes a send.
    #[derive(Default)]
    pub struct MockTransport {
        recorded: Mutex<Recorded>,
        held: Mutex<bool>,
        released: Condvar,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a reply for the next `send_and_receive`.
        pub fn push_reply(&self, payload: &[u8]) {
            lock(&self.recorded).replies.push_back(Ok(payload.to_vec()));
        }

        /// Queue a failure for the next `send_and_receive`.
        pub fn push_reply_error(&self, err: TransportError) {
            lock(&self.recorded).replies.push_back(Err(err));
        }

        /// Queue a failure for the next `send`.
        pub fn fail_next_send(&self, err: TransportError) {
            lock(&self.recorded).send_outcomes.push_back(Err(err));
        }

        /// Answer the next `broadcast` with these replies.
        pub fn set_broadcast_replies(&self, replies: Vec<Reply>) {
            lock(&self.recorded).broadcast = Some(Ok(replies));
        }

        /// Make `broadcast` fail.
        pub fn set_broadcast_error(&self, err: TransportError) {
            lock(&self.recorded).broadcast = Some(Err(err));
        }

        pub fn hold_sends(&self) {
            *lock(&self.held) = true;
        }

        pub fn release_sends(&self) {
            *lock(&self.held) = false;
            self.released.notify_all();
        }

        /// `send` payloads in call order.
        pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
            lock(&self.recorded).sent.clone()
        }

        /// `send` payloads decoded as JSON.
        pub fn sent_json(&self) -> Vec<serde_json::Value> {
            lock(&self.recorded)
                .sent
                .iter()
                .filter_map(|(_, p)| serde_json::from_slice(p).ok())
                .collect()
        }

        /// `send_and_receive` calls in call order.
        pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
            lock(&self.recorded).requests.clone()
        }

        pub fn broadcast_count(&self) -> usize {
            lock(&self.recorded).broadcasts
        }

        /// Total network calls of any kind.
        pub fn call_count(&self) -> usize {
            let r = lock(&self.recorded);
            r.sent.len() + r.requests.len() + r.broadcasts
        }

        /// Sends currently blocked inside `send`.
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }

        /// Highest number of concurrent sends observed.
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        fn send(&self, peer: &str, payload: &[u8]) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let outcome = {
                let mut r = lock(&self.recorded);
                r.sent.push((peer.to_string(), payload.to_vec()));
                r.send_outcomes.pop_front().unwrap_or(Ok(()))
            };

            let mut held = lock(&self.held);
            while *held {
                held = self
                    .released
                    .wait(held)
                    .unwrap_or_else(|e| e.into_inner());
            }
            drop(held);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }

        fn send_and_receive(
            &self,
            peer: &str,
            payload: &[u8],
            timeout: Duration,
        ) -> Result<Vec<u8>> {
            let mut r = lock(&self.recorded);
            r.requests.push((peer.to_string(), payload.to_vec()));
            r.replies
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout(timeout)))
        }

        fn broadcast(&self, _payload: &[u8], _window: Duration) -> Result<Vec<Reply>> {
            let mut r = lock(&self.recorded);
            r.broadcasts += 1;
            r.broadcast.clone().unwrap_or(Ok(Vec::new()))
        }
    }
}
