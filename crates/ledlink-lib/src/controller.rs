//! Controller — the API a front end drives.
//!
//! Owns the configuration mirror, the connection state machine and the
//! optional heartbeat, all behind one [`Arc`] so the sync loop sees edits and
//! peer changes as soon as they are made. Every method takes `&self`; a
//! `Controller` can be shared across threads.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::Config;
use crate::connection::{ConnectStep, Connection, ConnectionState};
use crate::device_config::{ConfigField, DeviceConfig, NetworkCredential};
use crate::error::Result;
use crate::networks::{self, CredentialField, MoveDirection, RemovalGate};
use crate::protocol::Command;
use crate::sync::{SyncLoop, SyncSource};
use crate::transport::Transport;

/// Result of [`Controller::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Was connected and no target was given: now disconnected.
    Toggled,
    /// A connect attempt is already running; nothing was done.
    Busy,
    /// The device answered and its configuration was merged.
    Connected,
    /// The attempt failed; the state is now `Error`. An attempt retired by a
    /// disconnect or peer change while its query was out leaves the state
    /// alone.
    Failed(String),
}

struct Shared {
    // Lock order: link, then config.
    link: Mutex<Connection>,
    config: Mutex<DeviceConfig>,
    status: Mutex<String>,
}

impl SyncSource for Shared {
    fn snapshot(&self) -> Option<(String, DeviceConfig)> {
        let link = lock(&self.link);
        if !link.is_connected() {
            return None;
        }
        let config = lock(&self.config).clone();
        Some((link.peer().to_string(), config))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Controller {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    removal: Mutex<RemovalGate>,
    sync: Mutex<Option<SyncLoop>>,
    reply_timeout: Duration,
}

impl Controller {
    /// New controller for the peer and timing in `settings`, starting
    /// disconnected with a default configuration.
    pub fn new(transport: Arc<dyn Transport>, settings: &Config) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared {
                link: Mutex::new(Connection::new(settings.peer.trim())),
                config: Mutex::new(DeviceConfig::default()),
                status: Mutex::new(String::new()),
            }),
            removal: Mutex::new(RemovalGate::new()),
            sync: Mutex::new(None),
            reply_timeout: settings.reply_timeout(),
        }
    }

    // ── Connection ──

    /// Connect to `target` (or the current peer), pulling its configuration.
    ///
    /// With no target while connected, this disconnects instead and makes
    /// no network call.
    pub fn connect(&self, target: Option<&str>) -> ConnectOutcome {
        let (addr, attempt) = match lock(&self.shared.link).begin_connect(target) {
            ConnectStep::Toggled => {
                log::info!("disconnected");
                self.set_status("Disconnected");
                return ConnectOutcome::Toggled;
            }
            ConnectStep::Busy => return ConnectOutcome::Busy,
            ConnectStep::Query(addr, attempt) => (addr, attempt),
        };
        self.set_status(format!("Connecting to {addr}..."));

        let reply = Command::GetConfig.encode().and_then(|query| {
            Ok(self
                .transport
                .send_and_receive(&addr, &query, self.reply_timeout)?)
        });

        let mut link = lock(&self.shared.link);
        if !link.is_pending(attempt) {
            log::debug!("connect to {addr} superseded");
            return ConnectOutcome::Failed(format!("connection to {addr} was superseded"));
        }
        let merged = reply.and_then(|payload| lock(&self.shared.config).merge_reply(&payload));
        match merged {
            Ok(()) => {
                link.finish_connect(attempt, Ok(()));
                drop(link);
                log::info!("connected to {addr}");
                self.set_status(format!("Connected to {addr}"));
                ConnectOutcome::Connected
            }
            Err(e) => {
                let msg = e.to_string();
                link.finish_connect(attempt, Err(msg.clone()));
                drop(link);
                log::warn!("connect to {addr} failed: {msg}");
                self.set_status(format!("Connect failed: {msg}"));
                ConnectOutcome::Failed(msg)
            }
        }
    }

    pub fn disconnect(&self) {
        lock(&self.shared.link).disconnect();
        self.set_status("Disconnected");
    }

    /// Change the device address. A live session is dropped, since the new
    /// address has not answered yet.
    pub fn set_peer(&self, peer: &str) {
        let invalidated = lock(&self.shared.link).set_peer(peer);
        if invalidated {
            log::info!("peer changed to {}; disconnected", peer.trim());
            self.set_status("IP changed, please reconnect");
        }
    }

    pub fn peer(&self) -> String {
        lock(&self.shared.link).peer().to_string()
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.shared.link).state().clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.link).is_connected()
    }

    pub fn status(&self) -> String {
        lock(&self.shared.status).clone()
    }

    fn set_status(&self, status: impl Into<String>) {
        *lock(&self.shared.status) = status.into();
    }

    // ── Configuration ──

    /// Snapshot of the configuration mirror.
    pub fn config(&self) -> DeviceConfig {
        lock(&self.shared.config).clone()
    }

    /// Apply one validated edit. The heartbeat picks it up on its next tick.
    pub fn update_config(&self, field: ConfigField, value: &str) -> Result<()> {
        lock(&self.shared.config).set(field, value)?;
        Ok(())
    }

    /// Edit the configuration in place. Values are normalized on the wire,
    /// not here.
    pub fn edit_config<R>(&self, f: impl FnOnce(&mut DeviceConfig) -> R) -> R {
        f(&mut lock(&self.shared.config))
    }

    /// Send a discrete command to the peer right away, bypassing the
    /// heartbeat. Not retried.
    pub fn send_immediate(&self, command: Command) -> Result<()> {
        let peer = self.peer();
        let result = command
            .encode()
            .and_then(|payload| Ok(self.transport.send(&peer, &payload)?));
        match &result {
            Ok(()) => self.set_status(format!("Sent {}", command.tag())),
            Err(e) => {
                log::warn!("{} to {peer} failed: {e}", command.tag());
                self.set_status(format!("Send failed: {e}"));
            }
        }
        result
    }

    // ── Heartbeat ──

    /// Source the sync loop reads from; lets a caller drive ticks by hand.
    pub fn sync_source(&self) -> Arc<dyn SyncSource> {
        self.shared.clone()
    }

    /// Start mirroring the configuration every `interval`. Restarts a
    /// running loop.
    pub fn start_sync(&self, interval: Duration) {
        let fresh = SyncLoop::start(self.sync_source(), Arc::clone(&self.transport), interval);
        *lock(&self.sync) = Some(fresh);
    }

    pub fn stop_sync(&self) {
        if let Some(mut sync) = lock(&self.sync).take() {
            sync.stop();
        }
    }

    pub fn is_syncing(&self) -> bool {
        lock(&self.sync).as_ref().is_some_and(SyncLoop::is_running)
    }

    // ── Networks ──

    /// Current credential list (empty when the device reported none).
    pub fn networks(&self) -> Vec<NetworkCredential> {
        lock(&self.shared.config).wifi.clone().unwrap_or_default()
    }

    fn with_networks<R>(&self, f: impl FnOnce(&mut Vec<NetworkCredential>) -> R) -> R {
        let mut config = lock(&self.shared.config);
        f(config.wifi.get_or_insert_with(Vec::new))
    }

    /// Append an empty credential entry; returns its index.
    pub fn add_network(&self) -> usize {
        self.with_networks(networks::add)
    }

    pub fn update_network(&self, index: usize, field: CredentialField, value: &str) -> bool {
        self.with_networks(|list| networks::update(list, index, field, value))
    }

    /// First step of removing an entry; see [`confirm_network_removal`](Self::confirm_network_removal).
    pub fn request_network_removal(&self, index: usize) -> bool {
        let list = self.networks();
        lock(&self.removal).request_removal(&list, index)
    }

    pub fn confirm_network_removal(&self, index: usize) -> Option<NetworkCredential> {
        let mut gate = lock(&self.removal);
        self.with_networks(|list| gate.confirm_removal(list, index))
    }

    pub fn cancel_network_removal(&self) {
        lock(&self.removal).cancel_removal();
    }

    pub fn move_network(&self, index: usize, direction: MoveDirection) -> bool {
        self.with_networks(|list| networks::move_entry(list, index, direction))
    }

    /// Push the credential list to the device and ask it to save.
    ///
    /// Does nothing when no list has been loaded or edited.
    pub fn commit_networks(&self) -> Result<()> {
        let Some(list) = lock(&self.shared.config).wifi.clone() else {
            log::debug!("no credential list to commit");
            return Ok(());
        };
        let peer = self.peer();
        match networks::commit(self.transport.as_ref(), &peer, &list) {
            Ok(()) => {
                self.set_status("WiFi settings saved");
                Ok(())
            }
            Err(e) => {
                self.set_status(format!("Saving WiFi settings failed: {e}"));
                Err(e)
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop_sync();
    }
}
