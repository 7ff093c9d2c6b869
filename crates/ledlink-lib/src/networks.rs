//! Network settings manager — the ordered WiFi credential list.
//!
//! Edits are pure operations on `Vec<NetworkCredential>`. Removal goes
//! through [`RemovalGate`] so the caller must confirm before an entry is
//! dropped. [`commit`] pushes the list to the device and asks it to persist.

use std::str::FromStr;

use crate::device_config::NetworkCredential;
use crate::error::{LedlinkError, Result};
use crate::protocol::Command;
use crate::transport::Transport;

/// Which half of a credential entry to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Ssid,
    Pass,
}

impl FromStr for CredentialField {
    type Err = LedlinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ssid" => Ok(CredentialField::Ssid),
            "pass" | "password" => Ok(CredentialField::Pass),
            other => Err(LedlinkError::Config(format!(
                "Unknown credential field: {other} (expected ssid or pass)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl FromStr for MoveDirection {
    type Err = LedlinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            other => Err(LedlinkError::Config(format!(
                "Unknown direction: {other} (expected up or down)"
            ))),
        }
    }
}

/// Append an empty entry; returns its index.
pub fn add(entries: &mut Vec<NetworkCredential>) -> usize {
    entries.push(NetworkCredential::default());
    entries.len() - 1
}

/// Replace one field of the entry at `index`. Out of bounds is a no-op.
pub fn update(
    entries: &mut [NetworkCredential],
    index: usize,
    field: CredentialField,
    value: &str,
) -> bool {
    let Some(entry) = entries.get_mut(index) else {
        return false;
    };
    match field {
        CredentialField::Ssid => entry.ssid = value.to_string(),
        CredentialField::Pass => entry.pass = value.to_string(),
    }
    true
}

/// Swap the entry with its neighbour. A move past either end is a no-op.
pub fn move_entry(entries: &mut [NetworkCredential], index: usize, direction: MoveDirection) -> bool {
    let target = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => index.checked_add(1),
    };
    match target {
        Some(t) if index < entries.len() && t < entries.len() => {
            entries.swap(index, t);
            true
        }
        _ => false,
    }
}

/// Two-step removal: nothing is removed until the pending index is confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalGate {
    pending: Option<usize>,
}

impl RemovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    /// Mark `index` for removal. Returns `false` (and clears any pending
    /// request) when out of bounds.
    pub fn request_removal(&mut self, entries: &[NetworkCredential], index: usize) -> bool {
        if index < entries.len() {
            self.pending = Some(index);
            true
        } else {
            self.pending = None;
            false
        }
    }

    /// Remove `index` if it is the pending one. Later entries shift down.
    pub fn confirm_removal(
        &mut self,
        entries: &mut Vec<NetworkCredential>,
        index: usize,
    ) -> Option<NetworkCredential> {
        if self.pending != Some(index) || index >= entries.len() {
            return None;
        }
        self.pending = None;
        Some(entries.remove(index))
    }

    pub fn cancel_removal(&mut self) {
        self.pending = None;
    }
}

/// Push the credential list, then ask the device to persist it.
///
/// `save` is only sent once the list itself went out.
pub fn commit(transport: &dyn Transport, peer: &str, entries: &[NetworkCredential]) -> Result<()> {
    let push = Command::Networks(entries.to_vec()).encode()?;
    transport.send(peer, &push)?;
    transport.send(peer, &Command::Save.encode()?)?;
    log::info!("committed {} network(s) to {peer}", entries.len());
    Ok(())
}
