//! Device discovery — broadcast a `discover` and collect who answers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::protocol::Command;
use crate::transport::{Reply, Transport};

/// A controller that answered a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub ip: String,
    pub mac: String,
}

#[derive(Deserialize)]
struct Announcement {
    mac: String,
    #[serde(default)]
    ip: Option<String>,
}

fn parse_reply(reply: &Reply) -> Option<DiscoveredDevice> {
    match serde_json::from_slice::<Announcement>(&reply.payload) {
        Ok(a) => Some(DiscoveredDevice {
            ip: a
                .ip
                .filter(|ip| !ip.trim().is_empty())
                .unwrap_or_else(|| reply.from.ip().to_string()),
            mac: a.mac,
        }),
        Err(e) => {
            log::debug!("ignoring scan reply from {}: {e}", reply.from);
            None
        }
    }
}

/// Keep the first device seen at each address, preserving order.
pub fn dedup_by_address(devices: Vec<DiscoveredDevice>) -> Vec<DiscoveredDevice> {
    let mut seen = HashSet::new();
    devices
        .into_iter()
        .filter(|d| seen.insert(d.ip.clone()))
        .collect()
}

/// Broadcast one scan and return the devices that answered within `window`.
///
/// Never fails: any transport error is logged and reads as "nothing found".
pub fn scan(transport: &dyn Transport, window: Duration) -> Vec<DiscoveredDevice> {
    let payload = match Command::Discover.encode() {
        Ok(p) => p,
        Err(e) => {
            log::warn!("scan: {e}");
            return Vec::new();
        }
    };
    let replies = match transport.broadcast(&payload, window) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("scan failed: {e}");
            return Vec::new();
        }
    };
    let devices = dedup_by_address(replies.iter().filter_map(parse_reply).collect());
    log::info!("scan found {} device(s)", devices.len());
    devices
}

// ── Session ──

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Scanning,
    Finished(Vec<DiscoveredDevice>),
    /// Cancelled before the scan finished. Final.
    Cancelled,
}

struct SessionState {
    phase: Mutex<Phase>,
    done: Condvar,
    cancelled: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A scan running in the background, plus the pick-then-confirm step that
/// precedes connecting to one of its results.
///
/// Dropping the session cancels it: a result that arrives afterwards is
/// discarded.
pub struct DiscoverySession {
    state: Arc<SessionState>,
    pending: Option<DiscoveredDevice>,
}

impl DiscoverySession {
    /// Start scanning on a background thread.
    pub fn start(transport: Arc<dyn Transport>, window: Duration) -> Self {
        let state = Arc::new(SessionState {
            phase: Mutex::new(Phase::Scanning),
            done: Condvar::new(),
            cancelled: AtomicBool::new(false),
        });
        let worker = Arc::clone(&state);
        thread::spawn(move || {
            let devices = scan(transport.as_ref(), window);
            let mut phase = lock(&worker.phase);
            if *phase != Phase::Scanning {
                log::debug!("scan finished after cancel; result dropped");
                return;
            }
            *phase = Phase::Finished(devices);
            worker.done.notify_all();
        });
        Self {
            state,
            pending: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        *lock(&self.state.phase) == Phase::Scanning
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Devices found so far; empty while scanning.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        match &*lock(&self.state.phase) {
            Phase::Finished(d) => d.clone(),
            Phase::Scanning | Phase::Cancelled => Vec::new(),
        }
    }

    /// Block until the scan finishes or `timeout` elapses. Returns `true` if
    /// it finished.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut phase = lock(&self.state.phase);
        while *phase == Phase::Scanning {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            phase = match self.state.done.wait_timeout(phase, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        matches!(*phase, Phase::Finished(_))
    }

    /// Abandon the scan. Idempotent; results already delivered are kept.
    pub fn cancel(&self) {
        let mut phase = lock(&self.state.phase);
        self.state.cancelled.store(true, Ordering::SeqCst);
        if *phase == Phase::Scanning {
            *phase = Phase::Cancelled;
        }
        self.state.done.notify_all();
    }

    /// Pick a device to connect to. Nothing connects until [`confirm`](Self::confirm).
    pub fn request_connect(&mut self, index: usize) -> Option<&DiscoveredDevice> {
        self.pending = self.devices().into_iter().nth(index);
        self.pending.as_ref()
    }

    pub fn pending(&self) -> Option<&DiscoveredDevice> {
        self.pending.as_ref()
    }

    /// Accept the picked device; returns the address to connect to.
    pub fn confirm(&mut self) -> Option<String> {
        self.pending.take().map(|d| d.ip)
    }

    pub fn dismiss(&mut self) {
        self.pending = None;
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use crate::transport::mock::MockTransport;
    use std::net::SocketAddr;

    fn reply(from: &str, body: &str) -> Reply {
        Reply {
            from: from.parse::<SocketAddr>().unwrap(),
            payload: body.as_bytes().to_vec(),
        }
    }

    fn device(ip: &str, mac: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            ip: ip.into(),
            mac: mac.into(),
        }
    }

    // ── scan ──

    #[test]
    fn scan_dedupes_by_address_in_order() {
        let mock = MockTransport::new();
        mock.set_broadcast_replies(vec![
            reply("10.0.0.5:8888", r#"{"mac":"AA"}"#),
            reply("10.0.0.6:8888", r#"{"mac":"BB"}"#),
            reply("10.0.0.5:8888", r#"{"mac":"AA"}"#),
        ]);
        let found = scan(&mock, Duration::from_millis(10));
        assert_eq!(found, vec![device("10.0.0.5", "AA"), device("10.0.0.6", "BB")]);
    }

    #[test]
    fn scan_prefers_announced_ip() {
        let mock = MockTransport::new();
        mock.set_broadcast_replies(vec![reply(
            "10.0.0.5:8888",
            r#"{"mac":"AA","ip":"192.168.4.1"}"#,
        )]);
        assert_eq!(
            scan(&mock, Duration::ZERO),
            vec![device("192.168.4.1", "AA")]
        );
    }

    #[test]
    fn scan_skips_undecodable_replies() {
        let mock = MockTransport::new();
        mock.set_broadcast_replies(vec![
            reply("10.0.0.7:8888", "hello"),
            reply("10.0.0.8:8888", r#"{"ip":"10.0.0.8"}"#),
            reply("10.0.0.9:8888", r#"{"mac":"CC"}"#),
        ]);
        assert_eq!(scan(&mock, Duration::ZERO), vec![device("10.0.0.9", "CC")]);
    }

    #[test]
    fn scan_error_reads_as_empty() {
        let mock = MockTransport::new();
        mock.set_broadcast_error(TransportError::Bind("denied".into()));
        assert!(scan(&mock, Duration::ZERO).is_empty());
        assert_eq!(mock.broadcast_count(), 1);
    }

    #[test]
    fn dedup_keeps_first_mac() {
        let d = dedup_by_address(vec![device("1.1.1.1", "A"), device("1.1.1.1", "B")]);
        assert_eq!(d, vec![device("1.1.1.1", "A")]);
    }

    // ── session ──

    #[test]
    fn session_finishes_with_devices() {
        let mock = Arc::new(MockTransport::new());
        mock.set_broadcast_replies(vec![reply("10.0.0.5:8888", r#"{"mac":"AA"}"#)]);
        let session = DiscoverySession::start(mock, Duration::ZERO);
        assert!(session.wait(Duration::from_secs(2)));
        assert!(!session.is_scanning());
        assert_eq!(session.devices(), vec![device("10.0.0.5", "AA")]);
    }

    #[test]
    fn confirm_returns_address_of_picked_device() {
        let mock = Arc::new(MockTransport::new());
        mock.set_broadcast_replies(vec![
            reply("10.0.0.5:8888", r#"{"mac":"AA"}"#),
            reply("10.0.0.6:8888", r#"{"mac":"BB"}"#),
        ]);
        let mut session = DiscoverySession::start(mock.clone(), Duration::ZERO);
        session.wait(Duration::from_secs(2));

        assert!(session.request_connect(9).is_none());
        assert_eq!(session.request_connect(1), Some(&device("10.0.0.6", "BB")));
        assert_eq!(session.confirm(), Some("10.0.0.6".to_string()));
        assert_eq!(session.confirm(), None);
        // Picking and confirming never talks to the device.
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn dismiss_clears_pending() {
        let mock = Arc::new(MockTransport::new());
        mock.set_broadcast_replies(vec![reply("10.0.0.5:8888", r#"{"mac":"AA"}"#)]);
        let mut session = DiscoverySession::start(mock, Duration::ZERO);
        session.wait(Duration::from_secs(2));
        session.request_connect(0);
        session.dismiss();
        assert_eq!(session.pending(), None);
        assert_eq!(session.confirm(), None);
    }

    #[test]
    fn cancelled_session_ignores_late_result() {
        struct SlowTransport(MockTransport);
        impl Transport for SlowTransport {
            fn send(&self, p: &str, d: &[u8]) -> crate::transport::Result<()> {
                self.0.send(p, d)
            }
            fn send_and_receive(
                &self,
                p: &str,
                d: &[u8],
                t: Duration,
            ) -> crate::transport::Result<Vec<u8>> {
                self.0.send_and_receive(p, d, t)
            }
            fn broadcast(&self, d: &[u8], w: Duration) -> crate::transport::Result<Vec<Reply>> {
                thread::sleep(Duration::from_millis(50));
                self.0.broadcast(d, w)
            }
        }

        let inner = MockTransport::new();
        inner.set_broadcast_replies(vec![reply("10.0.0.5:8888", r#"{"mac":"AA"}"#)]);
        let session = DiscoverySession::start(Arc::new(SlowTransport(inner)), Duration::ZERO);
        session.cancel();
        assert!(session.is_cancelled());
        assert!(!session.is_scanning());
        assert!(!session.wait(Duration::from_millis(10)));

        // The worker's result arrives after the cancel and must not land.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(*lock(&session.state.phase), Phase::Cancelled);
        assert!(!session.is_scanning());
        assert!(session.devices().is_empty());
    }

    #[test]
    fn cancel_after_finish_keeps_results() {
        let mock = Arc::new(MockTransport::new());
        mock.set_broadcast_replies(vec![reply("10.0.0.5:8888", r#"{"mac":"AA"}"#)]);
        let session = DiscoverySession::start(mock, Duration::ZERO);
        assert!(session.wait(Duration::from_secs(2)));
        session.cancel();
        assert!(session.is_cancelled());
        assert_eq!(session.devices(), vec![device("10.0.0.5", "AA")]);
        assert!(session.wait(Duration::ZERO));
    }
}
