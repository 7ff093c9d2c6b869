//! Config sync loop — mirrors the latest configuration to the peer on a fixed
//! heartbeat, with at most one send outstanding.
//!
//! A ticker thread calls [`SyncLoop::tick`] every period. A tick that finds a
//! send still outstanding, or no connected session, does nothing; ticks are
//! never queued. A dispatched tick snapshots the *current* configuration, so
//! however many edits land between two ticks, only the state at the tick
//! boundary goes on the wire. One sender thread performs the actual I/O,
//! fed through a single-slot channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device_config::DeviceConfig;
use crate::protocol::Command;
use crate::transport::Transport;

/// Where the loop reads what to mirror.
pub trait SyncSource: Send + Sync {
    /// Peer and configuration to send, or `None` while not connected.
    fn snapshot(&self) -> Option<(String, DeviceConfig)>;
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No connected session; nothing sent.
    NotConnected,
    /// The previous send has not completed; tick skipped.
    InFlight,
    /// A config datagram was handed to the sender.
    Dispatched,
    /// The snapshot could not be encoded or handed over; nothing sent.
    Dropped,
}

struct Outgoing {
    peer: String,
    payload: Vec<u8>,
}

struct Heartbeat {
    source: Arc<dyn SyncSource>,
    in_flight: Arc<AtomicBool>,
    slot: SyncSender<Outgoing>,
}

impl Heartbeat {
    fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return TickOutcome::InFlight;
        }

        let Some((peer, config)) = self.source.snapshot() else {
            self.in_flight.store(false, Ordering::SeqCst);
            return TickOutcome::NotConnected;
        };

        let payload = match Command::Config(config.normalized()).encode() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("heartbeat dropped: {e}");
                self.in_flight.store(false, Ordering::SeqCst);
                return TickOutcome::Dropped;
            }
        };

        if self.slot.try_send(Outgoing { peer, payload }).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return TickOutcome::Dropped;
        }
        TickOutcome::Dispatched
    }
}

fn run_sender(
    transport: Arc<dyn Transport>,
    in_flight: Arc<AtomicBool>,
    rx: Receiver<Outgoing>,
) {
    for job in rx {
        if let Err(e) = transport.send(&job.peer, &job.payload) {
            // Best effort: the next tick carries whatever is current.
            log::debug!("heartbeat to {} failed: {e}", job.peer);
        }
        in_flight.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running sync loop. Dropping it stops the heartbeat.
pub struct SyncLoop {
    heartbeat: Option<Arc<Heartbeat>>,
    stop: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl SyncLoop {
    /// Create a loop with a sender but no ticker; call [`tick`](Self::tick)
    /// to drive it by hand.
    pub fn new(source: Arc<dyn SyncSource>, transport: Arc<dyn Transport>) -> Self {
        let in_flight = Arc::new(AtomicBool::new(false));
        let (slot, rx) = mpsc::sync_channel(1);
        let sender_flag = Arc::clone(&in_flight);
        // Detached: exits once the slot closes and its current send returns.
        thread::spawn(move || run_sender(transport, sender_flag, rx));
        Self {
            heartbeat: Some(Arc::new(Heartbeat {
                source,
                in_flight,
                slot,
            })),
            stop: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }

    /// Create a loop that ticks every `interval` until stopped.
    pub fn start(
        source: Arc<dyn SyncSource>,
        transport: Arc<dyn Transport>,
        interval: Duration,
    ) -> Self {
        let mut sync = Self::new(source, transport);
        if let Some(hb) = sync.heartbeat.clone() {
            let stop = Arc::clone(&sync.stop);
            sync.ticker = Some(thread::spawn(move || {
                let mut next = Instant::now() + interval;
                while !stop.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now < next {
                        thread::park_timeout(next - now);
                        continue;
                    }
                    hb.tick();
                    next += interval;
                    if next < now {
                        // Fell behind (suspended process); don't burst.
                        next = now + interval;
                    }
                }
            }));
        }
        log::debug!("sync loop started ({}ms period)", interval.as_millis());
        sync
    }

    /// Run one tick now.
    pub fn tick(&self) -> TickOutcome {
        match &self.heartbeat {
            Some(hb) => hb.tick(),
            None => TickOutcome::NotConnected,
        }
    }

    /// Whether a send is currently outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.heartbeat
            .as_ref()
            .is_some_and(|hb| hb.in_flight.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Stop ticking and release the sender. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            ticker.thread().unpark();
            let _ = ticker.join();
        }
        if self.heartbeat.take().is_some() {
            log::debug!("sync loop stopped");
        }
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
