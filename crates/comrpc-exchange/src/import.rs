use std::sync::{Mutex, MutexGuard, PoisonError};

use comrpc_message::{Handle, InterfaceId};

/// An interface a peer has pushed to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteInterface {
    /// Announcing process.
    pub peer_id: u32,
    /// Exchange the peer was started under.
    pub exchange_id: u32,
    pub interface_id: InterfaceId,
    /// Peer-side handle; only meaningful when sent back to that peer.
    pub handle: Handle,
}

/// Interfaces offered to this process and not yet revoked.
#[derive(Debug, Default)]
pub struct ImportTable {
    entries: Mutex<Vec<RemoteInterface>>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an offer. A repeated offer of the same handle is kept once.
    pub fn offer(&self, remote: RemoteInterface) {
        let mut entries = self.lock();
        if !entries.contains(&remote) {
            entries.push(remote);
        }
    }

    /// Forget an offer. Returns `None` if nothing matched.
    pub fn revoke(
        &self,
        peer_id: u32,
        interface_id: InterfaceId,
        handle: Handle,
    ) -> Option<RemoteInterface> {
        let mut entries = self.lock();
        let position = entries.iter().position(|entry| {
            entry.peer_id == peer_id && entry.interface_id == interface_id && entry.handle == handle
        })?;
        Some(entries.remove(position))
    }

    /// Most recent offer of `interface_id`.
    pub fn find(&self, interface_id: InterfaceId) -> Option<RemoteInterface> {
        self.lock()
            .iter()
            .rev()
            .find(|entry| entry.interface_id == interface_id)
            .copied()
    }

    pub fn contains(&self, interface_id: InterfaceId, handle: Handle) -> bool {
        self.lock()
            .iter()
            .any(|entry| entry.interface_id == interface_id && entry.handle == handle)
    }

    pub fn list(&self) -> Vec<RemoteInterface> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RemoteInterface>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
