use std::sync::Arc;

use crate::administrator::ServiceAdministrator;
use crate::capability::{CapabilityRef, Exported, InterfaceId, Unknown};
use crate::library::Library;
use crate::service::Service;

/// Pack a `major.minor` version the way registrations store it.
pub const fn version(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

/// A class that can be built by name through a [`ServiceAdministrator`].
pub trait ServiceMetadata: Send + Sync {
    /// Class name that instantiation requests match against.
    fn name(&self) -> &str;

    /// Name of the module advertising the class.
    fn module(&self) -> &str;

    fn version(&self) -> u32;

    /// Build an instance bound to `library` and return its `interface_id`
    /// capability. An instance lacking the capability is destroyed at once.
    fn create(
        &self,
        administrator: &ServiceAdministrator,
        library: &Library,
        interface_id: InterfaceId,
    ) -> Option<CapabilityRef>;
}

/// Registration entry for `T`, named after the type.
pub struct ServiceRegistration<T: Exported> {
    name: String,
    module: String,
    version: u32,
    factory: fn() -> T,
}

impl<T: Exported> ServiceRegistration<T> {
    pub fn new(module: impl Into<String>, major: u16, minor: u16, factory: fn() -> T) -> Self {
        Self {
            name: class_name::<T>().to_string(),
            module: module.into(),
            version: version(major, minor),
            factory,
        }
    }

    /// Override the class name derived from the type.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Exported> ServiceMetadata for ServiceRegistration<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn module(&self) -> &str {
        &self.module
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn create(
        &self,
        administrator: &ServiceAdministrator,
        library: &Library,
        interface_id: InterfaceId,
    ) -> Option<CapabilityRef> {
        let service = Service::bound(administrator, Some(library.clone()), (self.factory)());
        Unknown::query_interface(service, interface_id)
    }
}

/// Unqualified name of `T`, without module path or generic arguments.
pub fn class_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Convenience for registering a type-erased entry.
pub fn registration<T: Exported>(
    module: impl Into<String>,
    major: u16,
    minor: u16,
    factory: fn() -> T,
) -> Arc<dyn ServiceMetadata> {
    Arc::new(ServiceRegistration::new(module, major, minor, factory))
}
