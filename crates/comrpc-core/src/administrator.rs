use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capability::{Capability, CapabilityRef, Interface, InterfaceId};
use crate::library::Library;
use crate::metadata::ServiceMetadata;
use crate::refcount::{RefCount, ReleaseStatus};

/// Version that matches every registration.
pub const ANY_VERSION: u32 = u32::MAX;

#[derive(Default)]
struct Shared {
    services: Mutex<Vec<Arc<dyn ServiceMetadata>>>,
    instances: RefCount,
    unreferenced: Mutex<Vec<Library>>,
}

/// Process-scoped registry of instantiable services.
///
/// Construct one at startup and hand clones to everything that builds or
/// resolves objects. Clones share the same registry and counters.
#[derive(Clone, Default)]
pub struct ServiceAdministrator {
    inner: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServiceAdministrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more live instance.
    pub(crate) fn add_ref(&self) -> u32 {
        self.inner.instances.add_ref()
    }

    /// Count one instance gone.
    pub(crate) fn release(&self) -> ReleaseStatus {
        self.inner.instances.release()
    }

    /// Live instances across all services. Zero means the hosting process
    /// may exit.
    pub fn instances(&self) -> u32 {
        self.inner.instances.count()
    }

    pub fn register(&self, metadata: Arc<dyn ServiceMetadata>) {
        tracing::debug!(
            service = metadata.name(),
            module = metadata.module(),
            version = format_args!("{:#x}", metadata.version()),
            "registered service"
        );
        lock(&self.inner.services).push(metadata);
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn unregister(&self, metadata: &Arc<dyn ServiceMetadata>) -> bool {
        let mut services = lock(&self.inner.services);
        let before = services.len();
        services.retain(|entry| !Arc::ptr_eq(entry, metadata));
        let removed = services.len() != before;
        if removed {
            tracing::debug!(service = metadata.name(), "unregistered service");
        }
        removed
    }

    /// Names and versions of every registration, in registration order.
    pub fn services(&self) -> Vec<(String, u32)> {
        lock(&self.inner.services)
            .iter()
            .map(|entry| (entry.name().to_string(), entry.version()))
            .collect()
    }

    /// Build `name` at `version` from `library` and return its
    /// `interface_id` capability.
    ///
    /// Returns `None` if nothing matches or the instance lacks the
    /// capability; in the latter case the instance is already destroyed.
    pub fn instantiate(
        &self,
        library: &Library,
        name: &str,
        version: u32,
        interface_id: InterfaceId,
    ) -> Option<CapabilityRef> {
        let metadata = lock(&self.inner.services)
            .iter()
            .find(|entry| {
                entry.name() == name && (version == ANY_VERSION || entry.version() == version)
            })
            .cloned();

        let Some(metadata) = metadata else {
            tracing::debug!(service = name, version, "no matching service registration");
            return None;
        };

        let result = metadata.create(self, library, interface_id);
        tracing::debug!(
            service = name,
            library = library.name(),
            interface_id = format_args!("{interface_id:#x}"),
            resolved = result.is_some(),
            "instantiated service"
        );
        result
    }

    /// Typed [`ServiceAdministrator::instantiate`].
    pub fn instantiate_as<I: Interface + ?Sized>(
        &self,
        library: &Library,
        name: &str,
        version: u32,
    ) -> Option<Capability<I>> {
        self.instantiate(library, name, version, I::ID)?
            .downcast::<I>()
    }

    /// Hand back a library reference held by a destroyed instance.
    ///
    /// At most one reference per library is parked until
    /// [`ServiceAdministrator::flush_libraries`], so a library is never
    /// unloaded from inside code it hosts. Further references to a library
    /// that is already parked are dropped on the spot.
    pub fn release_library(&self, library: Library) {
        let mut parked = lock(&self.inner.unreferenced);
        if parked.contains(&library) {
            return;
        }
        parked.push(library);
    }

    /// Libraries waiting for [`ServiceAdministrator::flush_libraries`].
    pub fn parked_libraries(&self) -> usize {
        lock(&self.inner.unreferenced).len()
    }

    /// Drop every parked library reference. Returns how many libraries were
    /// unloaded as a result.
    pub fn flush_libraries(&self) -> usize {
        let parked = std::mem::take(&mut *lock(&self.inner.unreferenced));
        let mut unloaded = 0;
        for library in parked {
            let name = library.name().to_string();
            if library.unload() {
                tracing::debug!(library = %name, "released last library reference");
                unloaded += 1;
            }
        }
        unloaded
    }
}

impl std::fmt::Debug for ServiceAdministrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAdministrator")
            .field("services", &self.services())
            .field("instances", &self.instances())
            .finish()
    }
}
