use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use comrpc_core::{CapabilityRef, InterfaceId, ReleaseStatus};
use comrpc_message::Handle;

use crate::error::{ExchangeError, Result};

struct Export {
    capability: CapabilityRef,
    remote: u32,
}

/// Capabilities this process has handed to peers, keyed by the handle the
/// peer addresses them with.
///
/// Handles start at 1 and are never reused, so a stale handle from a
/// released or revoked export can never reach a newer object. Each entry
/// holds one local reference and counts the references the peer holds on it.
#[derive(Default)]
pub struct ExportTable {
    entries: Mutex<HashMap<Handle, Export>>,
    next: AtomicUsize,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `capability` under a fresh handle with one remote reference.
    pub fn export(&self, capability: CapabilityRef) -> Handle {
        let handle = Handle::new(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        tracing::trace!(
            %handle,
            interface_id = format_args!("{:#x}", capability.interface_id()),
            "exported capability"
        );
        self.lock().insert(
            handle,
            Export {
                capability,
                remote: 1,
            },
        );
        handle
    }

    /// A new reference to the capability behind `handle`.
    pub fn resolve(&self, handle: Handle) -> Option<CapabilityRef> {
        self.lock()
            .get(&handle)
            .map(|entry| entry.capability.clone())
    }

    pub fn interface_id(&self, handle: Handle) -> Option<InterfaceId> {
        self.lock()
            .get(&handle)
            .map(|entry| entry.capability.interface_id())
    }

    /// Count one more remote reference. Returns the new remote count.
    ///
    /// The count is driven by the peer, so a count that would overflow is
    /// refused and left unchanged.
    pub fn add_ref(&self, handle: Handle) -> Result<u32> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(&handle)
            .ok_or(ExchangeError::InvalidHandle(handle))?;
        entry.remote = entry
            .remote
            .checked_add(1)
            .ok_or(ExchangeError::ReferenceOverflow(handle))?;
        Ok(entry.remote)
    }

    /// Drop one remote reference.
    ///
    /// When the peer lets go of its last reference the entry is removed and
    /// the local reference released; the returned status then says whether
    /// that destroyed the object.
    pub fn release(&self, handle: Handle) -> Option<ReleaseStatus> {
        let removed = {
            let mut entries = self.lock();
            let entry = entries.get_mut(&handle)?;
            entry.remote -= 1;
            if entry.remote > 0 {
                return Some(ReleaseStatus::Alive);
            }
            entries.remove(&handle)?
        };
        // Destruction runs drop code; keep it outside the lock.
        let status = removed.capability.release();
        tracing::trace!(%handle, destroyed = status.is_destroyed(), "released export");
        Some(status)
    }

    /// Withdraw `handle` regardless of remote references. Returns the
    /// capability so the caller decides when the local reference goes.
    pub fn revoke(&self, handle: Handle) -> Option<CapabilityRef> {
        let removed = self.lock().remove(&handle)?;
        tracing::trace!(%handle, remote = removed.remote, "revoked export");
        Some(removed.capability)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Handle, Export>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportTable")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine, Engine};
    use comrpc_core::{Capability, ServiceAdministrator};

    fn exported(admin: &ServiceAdministrator) -> CapabilityRef {
        CapabilityRef::new(engine(admin))
    }

    #[test]
    fn handles_start_at_one_and_are_not_reused() {
        let admin = ServiceAdministrator::new();
        let table = ExportTable::new();

        let first = table.export(exported(&admin));
        let second = table.export(exported(&admin));
        assert_eq!(first, Handle::new(1));
        assert_eq!(second, Handle::new(2));

        assert!(table.revoke(first).is_some());
        let third = table.export(exported(&admin));
        assert_eq!(third, Handle::new(3));
        assert!(!table.contains(first));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn same_object_exported_twice_gets_distinct_handles() {
        let admin = ServiceAdministrator::new();
        let table = ExportTable::new();
        let capability = exported(&admin);

        let first = table.export(capability.clone());
        let second = table.export(capability);
        assert_ne!(first, second);
        assert_eq!(table.interface_id(first), table.interface_id(second));
    }

    #[test]
    fn last_remote_release_destroys_object() {
        let admin = ServiceAdministrator::new();
        let table = ExportTable::new();
        let handle = table.export(exported(&admin));
        assert_eq!(admin.instances(), 1);

        assert_eq!(table.add_ref(handle).unwrap(), 2);
        assert_eq!(table.release(handle), Some(ReleaseStatus::Alive));
        assert!(table.contains(handle));

        assert_eq!(table.release(handle), Some(ReleaseStatus::Destroyed));
        assert!(table.is_empty());
        assert_eq!(admin.instances(), 0);
        assert_eq!(table.release(handle), None);
    }

    #[test]
    fn release_keeps_object_referenced_elsewhere() {
        let admin = ServiceAdministrator::new();
        let table = ExportTable::new();
        let local: Capability<Engine> = engine(&admin);
        let handle = table.export(CapabilityRef::new(local.clone()));

        assert_eq!(table.release(handle), Some(ReleaseStatus::Alive));
        assert!(!table.contains(handle));
        assert_eq!(admin.instances(), 1);
        assert_eq!(local.release(), ReleaseStatus::Destroyed);
    }

    #[test]
    fn resolve_unknown_handle_is_none() {
        let table = ExportTable::new();
        assert!(table.resolve(Handle::new(42)).is_none());
        assert!(matches!(
            table.add_ref(Handle::NULL),
            Err(ExchangeError::InvalidHandle(_))
        ));
        assert!(table.revoke(Handle::new(42)).is_none());
    }

    #[test]
    fn add_ref_refuses_to_overflow() {
        let admin = ServiceAdministrator::new();
        let table = ExportTable::new();
        let handle = table.export(exported(&admin));
        if let Some(entry) = table.lock().get_mut(&handle) {
            entry.remote = u32::MAX;
        }

        assert!(matches!(
            table.add_ref(handle),
            Err(ExchangeError::ReferenceOverflow(h)) if h == handle
        ));
        assert_eq!(table.release(handle), Some(ReleaseStatus::Alive));
        assert_eq!(table.add_ref(handle).unwrap(), u32::MAX);
    }
}
