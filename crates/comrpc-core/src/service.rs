use std::ops::Deref;
use std::sync::Arc;

use crate::administrator::ServiceAdministrator;
use crate::capability::{
    itself, Capability, CapabilityRef, Exported, Holder, Interface, InterfaceId, Unknown,
};
use crate::library::Library;
use crate::refcount::ReleaseStatus;

/// An exported object counted in a [`ServiceAdministrator`].
///
/// Construction counts one live instance and destruction gives it back.
/// An instance built from a library keeps that library loaded until it is
/// destroyed, then parks the reference with the administrator.
pub struct Service<T: Exported> {
    object: T,
    administrator: ServiceAdministrator,
    library: Option<Library>,
}

impl<T: Exported> Service<T> {
    pub(crate) fn bound(
        administrator: &ServiceAdministrator,
        library: Option<Library>,
        object: T,
    ) -> Arc<Self> {
        administrator.add_ref();
        Arc::new(Self {
            object,
            administrator: administrator.clone(),
            library,
        })
    }

    /// Wrap `object` and return it as its own concrete type.
    pub fn instance(administrator: &ServiceAdministrator, object: T) -> Capability<T> {
        let owner: Arc<dyn Holder<T>> = Self::bound(administrator, None, object);
        Capability::project(owner, itself::<T>)
    }

    /// Wrap `object` and query it for `I`. An object lacking `I` is
    /// destroyed before this returns.
    pub fn create<I: Interface + ?Sized>(
        administrator: &ServiceAdministrator,
        object: T,
    ) -> Option<Capability<I>> {
        let service = Self::bound(administrator, None, object);
        Unknown::query_interface(service, I::ID)?.downcast::<I>()
    }

    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }
}

impl<T: Exported> Deref for Service<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T: Exported> Unknown for Service<T> {
    fn query_interface(self: Arc<Self>, id: InterfaceId) -> Option<CapabilityRef> {
        T::interfaces().query(self, id)
    }

    fn release(self: Arc<Self>) -> ReleaseStatus {
        match Arc::into_inner(self) {
            Some(service) => {
                drop(service);
                ReleaseStatus::Destroyed
            }
            None => ReleaseStatus::Alive,
        }
    }
}

impl<T: Exported> Holder<T> for Service<T> {
    fn target(&self) -> &T {
        &self.object
    }

    fn into_unknown(self: Arc<Self>) -> Arc<dyn Unknown> {
        self
    }
}

impl<T: Exported> Drop for Service<T> {
    fn drop(&mut self) {
        self.administrator.release();
        if let Some(library) = self.library.take() {
            self.administrator.release_library(library);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::capability::{query, InterfaceMap, UNKNOWN_ID};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    impl Interface for dyn Greeter {
        const ID: InterfaceId = 0x30;
    }

    trait Absent: Send + Sync {}

    impl Interface for dyn Absent {
        const ID: InterfaceId = 0x31;
    }

    struct Host {
        name: String,
    }

    impl Greeter for Host {
        fn greet(&self) -> String {
            format!("hello from {}", self.name)
        }
    }

    impl Exported for Host {
        fn interfaces() -> &'static InterfaceMap<Self> {
            static MAP: LazyLock<InterfaceMap<Host>> =
                LazyLock::new(|| InterfaceMap::<Host>::new().entry::<dyn Greeter>(|h| h));
            &MAP
        }
    }

    fn host() -> Host {
        Host {
            name: "host".to_string(),
        }
    }

    #[test]
    fn instance_counts_in_administrator() {
        let admin = ServiceAdministrator::new();
        let host = Service::instance(&admin, host());
        assert_eq!(admin.instances(), 1);
        assert_eq!(host.ref_count(), 1);
        assert_eq!(host.name, "host");

        let extra = host.clone();
        assert_eq!(host.release(), ReleaseStatus::Alive);
        assert_eq!(admin.instances(), 1);
        assert_eq!(extra.release(), ReleaseStatus::Destroyed);
        assert_eq!(admin.instances(), 0);
    }

    #[test]
    fn create_queries_requested_interface() {
        let admin = ServiceAdministrator::new();
        let greeter = Service::create::<dyn Greeter>(&admin, host()).unwrap();
        assert_eq!(greeter.greet(), "hello from host");
        assert_eq!(admin.instances(), 1);

        let again = query::<dyn Greeter>(greeter.unknown()).unwrap();
        assert_eq!(again.ref_count(), 2);
    }

    #[test]
    fn create_without_capability_destroys_object() {
        let admin = ServiceAdministrator::new();
        assert!(Service::create::<dyn Absent>(&admin, host()).is_none());
        assert_eq!(admin.instances(), 0);
    }

    #[test]
    fn unknown_reference_keeps_service_alive() {
        let admin = ServiceAdministrator::new();
        let greeter = Service::create::<dyn Greeter>(&admin, host()).unwrap();
        let unknown = greeter.unknown().query_interface(UNKNOWN_ID).unwrap();

        assert_eq!(greeter.release(), ReleaseStatus::Alive);
        assert_eq!(admin.instances(), 1);
        assert_eq!(unknown.release(), ReleaseStatus::Destroyed);
        assert_eq!(admin.instances(), 0);
    }

    #[test]
    fn builtin_instance_parks_no_library() {
        let admin = ServiceAdministrator::new();
        drop(Service::instance(&admin, host()));
        assert_eq!(admin.flush_libraries(), 0);
    }
}
